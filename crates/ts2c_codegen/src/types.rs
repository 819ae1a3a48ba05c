use std::collections::HashMap;
use std::fmt;

use crate::NodeId;

/// C-level type of a value, as the statement translator sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CType {
    Number,
    Boolean,
    String,
    Void,
    Array(Box<ArrayType>),
    /// String-keyed dictionary. Keys live in `index`, values in `values`.
    Dict(Box<DictType>),
    Struct { name: String },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType {
    pub element_type: CType,
    /// Element count of a fixed array; initial capacity of a dynamic one.
    pub capacity: usize,
    pub is_dynamic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictType {
    pub element_type: CType,
}

impl CType {
    pub fn fixed_array(element_type: CType, capacity: usize) -> Self {
        CType::Array(Box::new(ArrayType {
            element_type,
            capacity,
            is_dynamic: false,
        }))
    }

    pub fn dynamic_array(element_type: CType) -> Self {
        CType::Array(Box::new(ArrayType {
            element_type,
            capacity: 0,
            is_dynamic: true,
        }))
    }

    pub fn dict(element_type: CType) -> Self {
        CType::Dict(Box::new(DictType { element_type }))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, CType::Number)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, CType::String)
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match self {
            CType::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&DictType> {
        match self {
            CType::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn is_dynamic_array(&self) -> bool {
        self.as_array().is_some_and(|array| array.is_dynamic)
    }

    /// Values of this type are heap allocations owned by the declaring scope.
    pub fn is_heap_owned(&self) -> bool {
        match self {
            CType::Array(array) => array.is_dynamic,
            CType::Dict(_) | CType::Struct { .. } => true,
            _ => false,
        }
    }

    /// Does this type, or anything nested in it, need the `ARRAY` runtime?
    pub fn uses_array_runtime(&self) -> bool {
        match self {
            CType::Array(array) => array.is_dynamic || array.element_type.uses_array_runtime(),
            CType::Dict(_) => true,
            _ => false,
        }
    }

    pub fn uses_dict_runtime(&self) -> bool {
        match self {
            CType::Array(array) => array.element_type.uses_dict_runtime(),
            CType::Dict(_) => true,
            _ => false,
        }
    }

    /// The C spelling of the type when used as a value (parameter, return,
    /// element of a container).
    pub fn c_name(&self) -> String {
        match self {
            CType::Number => "int16_t".to_string(),
            CType::Boolean => "uint8_t".to_string(),
            CType::String => "const char *".to_string(),
            CType::Void => "void".to_string(),
            CType::Array(array) if array.is_dynamic => {
                format!("ARRAY({})", array.element_type.element_c_name())
            }
            CType::Array(array) => format!("{} *", array.element_type.element_c_name()),
            CType::Dict(dict) => format!("DICT({})", dict.element_type.element_c_name()),
            CType::Struct { name } => format!("struct {name} *"),
            CType::Unknown => "void *".to_string(),
        }
    }

    /// Nested containers are stored as untyped pointers.
    fn element_c_name(&self) -> String {
        match self {
            CType::Array(_) => "void *".to_string(),
            other => other.c_name(),
        }
    }

    /// A C declarator for a variable or parameter called `name`.
    pub fn declare(&self, name: &str) -> String {
        match self {
            CType::Array(array) if !array.is_dynamic => format!(
                "{} {name}[{}]",
                array.element_type.element_c_name(),
                array.capacity
            ),
            other => join_declarator(&other.c_name(), name),
        }
    }
}

/// `int16_t x`, but `const char *x`.
pub(crate) fn join_declarator(c_type: &str, name: &str) -> String {
    if c_type.ends_with('*') {
        format!("{c_type}{name}")
    } else {
        format!("{c_type} {name}")
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CType::Number => write!(f, "number"),
            CType::Boolean => write!(f, "boolean"),
            CType::String => write!(f, "string"),
            CType::Void => write!(f, "void"),
            CType::Array(array) if array.is_dynamic => write!(f, "{}[]", array.element_type),
            CType::Array(array) => write!(f, "{}[{}]", array.element_type, array.capacity),
            CType::Dict(dict) => write!(f, "{{ [key: string]: {} }}", dict.element_type),
            CType::Struct { name } => write!(f, "{name}"),
            CType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Answers "what C type does this node have".
pub trait TypeOracle {
    fn type_of(&self, id: NodeId) -> Option<CType>;
}

/// Types resolved ahead of translation, keyed by node.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: HashMap<NodeId, CType>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NodeId, ty: CType) {
        self.types.insert(id, ty);
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut CType> {
        self.types.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeOracle for TypeTable {
    fn type_of(&self, id: NodeId) -> Option<CType> {
        self.types.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_ownership() {
        assert!(CType::dynamic_array(CType::Number).is_heap_owned());
        assert!(!CType::fixed_array(CType::Number, 3).is_heap_owned());
        assert!(CType::dict(CType::String).is_heap_owned());
        assert!(
            CType::Struct {
                name: "point".into()
            }
            .is_heap_owned()
        );
        assert!(!CType::String.is_heap_owned());
    }

    #[test]
    fn test_declarators() {
        assert_eq!(CType::Number.declare("x"), "int16_t x");
        assert_eq!(CType::String.declare("s"), "const char *s");
        assert_eq!(CType::fixed_array(CType::Number, 5).declare("a"), "int16_t a[5]");
        assert_eq!(
            CType::dynamic_array(CType::String).declare("names"),
            "ARRAY(const char *) names"
        );
        assert_eq!(
            CType::dynamic_array(CType::dynamic_array(CType::Number)).declare("grid"),
            "ARRAY(void *) grid"
        );
        assert_eq!(CType::dict(CType::Number).declare("d"), "DICT(int16_t) d");
    }

    #[test]
    fn test_type_table_lookup() {
        let mut table = TypeTable::new();
        table.insert(NodeId(7), CType::Boolean);
        assert_eq!(table.type_of(NodeId(7)), Some(CType::Boolean));
        assert_eq!(table.type_of(NodeId(8)), None);
    }
}
