//! Lexical scopes of the generated C.
//!
//! Scopes live in an arena owned by the [`Translator`](crate::Translator) and
//! are addressed by [`ScopeId`]. Each one records its parent, the function
//! scope it belongs to, and the locals that will be declared at its top.

use crate::error::CodegenError;
use crate::template::{Renderable, Value};
use crate::types::CType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[cfg(test)]
impl ScopeId {
    /// The scope created `index`-th in its tree.
    pub(crate) fn nth(index: usize) -> Self {
        ScopeId(index)
    }
}

/// A local that needs a C declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct CVariable {
    pub name: String,
    pub ty: CType,
}

impl CVariable {
    pub fn new(name: impl Into<String>, ty: CType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl Renderable for CVariable {
    fn name(&self) -> &'static str {
        "CVariable"
    }

    fn template(&self) -> &'static str {
        "{declaration};\n"
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "declaration" => Some(Value::text(self.ty.declare(&self.name))),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct ScopeData {
    parent: Option<ScopeId>,
    func: ScopeId,
    variables: Vec<CVariable>,
}

#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<ScopeData>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, id: ScopeId) -> Result<&ScopeData, CodegenError> {
        self.scopes.get(id.0).ok_or(CodegenError::UnknownScope(id))
    }

    fn get_mut(&mut self, id: ScopeId) -> Result<&mut ScopeData, CodegenError> {
        self.scopes.get_mut(id.0).ok_or(CodegenError::UnknownScope(id))
    }

    /// A scope that is its own function scope.
    pub fn new_function_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(ScopeData {
            parent: None,
            func: id,
            variables: Vec::new(),
        });
        id
    }

    /// A nested scope inheriting the parent's function scope.
    pub fn new_child(&mut self, parent: ScopeId) -> Result<ScopeId, CodegenError> {
        let func = self.get(parent)?.func;
        let id = ScopeId(self.scopes.len());
        self.scopes.push(ScopeData {
            parent: Some(parent),
            func,
            variables: Vec::new(),
        });
        Ok(id)
    }

    pub fn parent(&self, id: ScopeId) -> Result<Option<ScopeId>, CodegenError> {
        Ok(self.get(id)?.parent)
    }

    pub fn func(&self, id: ScopeId) -> Result<ScopeId, CodegenError> {
        Ok(self.get(id)?.func)
    }

    pub fn variables(&self, id: ScopeId) -> Result<&[CVariable], CodegenError> {
        Ok(&self.get(id)?.variables)
    }

    /// Declare a local. Returns `false` if the scope already had one by that name.
    pub fn add_variable(&mut self, id: ScopeId, variable: CVariable) -> Result<bool, CodegenError> {
        let variables = &mut self.get_mut(id)?.variables;
        if variables.iter().any(|v| v.name == variable.name) {
            return Ok(false);
        }
        variables.push(variable);
        Ok(true)
    }

    /// Take every local out of a scope, leaving it empty.
    pub fn drain_variables(&mut self, id: ScopeId) -> Result<Vec<CVariable>, CodegenError> {
        Ok(std::mem::take(&mut self.get_mut(id)?.variables))
    }

    /// Append locals to a scope, skipping names it already declares.
    pub fn extend_variables(
        &mut self,
        id: ScopeId,
        variables: Vec<CVariable>,
    ) -> Result<(), CodegenError> {
        for variable in variables {
            self.add_variable(id, variable)?;
        }
        Ok(())
    }

    /// `id` and its ancestors up to and including its function scope,
    /// innermost first.
    pub fn chain_to_function(&self, id: ScopeId) -> Result<Vec<ScopeId>, CodegenError> {
        let func = self.func(id)?;
        let mut chain = vec![id];
        let mut current = id;
        while current != func {
            match self.parent(current)? {
                Some(parent) => {
                    chain.push(parent);
                    current = parent;
                }
                None => break,
            }
        }
        Ok(chain)
    }

    /// Every local in every scope, scope by scope.
    pub fn all_variables(&self) -> impl Iterator<Item = &CVariable> {
        self.scopes.iter().flat_map(|scope| scope.variables.iter())
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_inherits_function_scope() {
        let mut tree = ScopeTree::new();
        let func = tree.new_function_scope();
        let block = tree.new_child(func).unwrap();
        let inner = tree.new_child(block).unwrap();
        assert_eq!(tree.func(func).unwrap(), func);
        assert_eq!(tree.func(inner).unwrap(), func);
        assert_eq!(tree.parent(inner).unwrap(), Some(block));
        assert_eq!(tree.chain_to_function(inner).unwrap(), vec![inner, block, func]);
    }

    #[test]
    fn test_variables_are_unique_by_name() {
        let mut tree = ScopeTree::new();
        let func = tree.new_function_scope();
        assert!(tree.add_variable(func, CVariable::new("x", CType::Number)).unwrap());
        assert!(!tree.add_variable(func, CVariable::new("x", CType::String)).unwrap());
        assert_eq!(tree.variables(func).unwrap().len(), 1);
    }

    #[test]
    fn test_drain_moves_variables_to_parent() {
        let mut tree = ScopeTree::new();
        let func = tree.new_function_scope();
        let looped = tree.new_child(func).unwrap();
        tree.add_variable(func, CVariable::new("i", CType::Number)).unwrap();
        tree.add_variable(looped, CVariable::new("tmp", CType::Number)).unwrap();
        tree.add_variable(looped, CVariable::new("i", CType::Number)).unwrap();

        let drained = tree.drain_variables(looped).unwrap();
        tree.extend_variables(func, drained).unwrap();

        assert!(tree.variables(looped).unwrap().is_empty());
        let names: Vec<_> = tree.variables(func).unwrap().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["i", "tmp"]);
    }

    #[test]
    fn test_unknown_scope_is_an_error() {
        let tree = ScopeTree::new();
        let err = tree.variables(ScopeId(3)).unwrap_err();
        assert!(matches!(err, CodegenError::UnknownScope(ScopeId(3))));
    }

    #[test]
    fn test_variable_renders_declaration() {
        let var = CVariable::new("count", CType::Number);
        assert_eq!(crate::template::render(&var).unwrap(), "int16_t count;\n");
    }
}
