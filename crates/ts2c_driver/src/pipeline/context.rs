use std::collections::{BTreeSet, HashMap, HashSet};

use log::debug;
use ts2c_codegen::types::{CType, TypeOracle, TypeTable};
use ts2c_codegen::{NodeId, Span};

/// A lowering failure, located by byte span. The compile stage turns it into
/// a `file:line:col` diagnostic.
#[derive(Debug, Clone)]
pub(crate) struct LowerError {
    pub(crate) span: Span,
    pub(crate) message: String,
}

impl LowerError {
    pub(crate) fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

pub(crate) type LowerResult<T> = Result<T, LowerError>;

/// One declared variable or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BindingId(usize);

/// What lowering produced besides the IR itself.
pub(crate) struct Resolved {
    pub(crate) types: TypeTable,
    pub(crate) identifiers: BTreeSet<String>,
}

/// Lowering context: node ids, resolved types, visible bindings and the
/// declared shapes the types are resolved against.
pub(crate) struct LowerCtx {
    next_id: u32,
    types: TypeTable,
    /// Variable name -> binding visible at this point of the walk.
    pub(crate) var_bindings: HashMap<String, BindingId>,
    /// Binding -> its current type.
    binding_types: Vec<CType>,
    /// Node -> the binding whose type it carries.
    binding_nodes: HashMap<NodeId, BindingId>,
    /// Array bindings that are pushed to or popped from somewhere.
    growable: HashSet<BindingId>,
    /// Function name -> declared return type.
    pub(crate) fn_ret_types: HashMap<String, CType>,
    /// Interface / object type alias name -> field types.
    pub(crate) struct_defs: HashMap<String, HashMap<String, CType>>,
    /// Non-struct type alias name -> resolved type.
    pub(crate) type_aliases: HashMap<String, CType>,
    /// Every identifier spelled in the source.
    identifiers: BTreeSet<String>,
}

impl LowerCtx {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            types: TypeTable::new(),
            var_bindings: HashMap::new(),
            binding_types: Vec::new(),
            binding_nodes: HashMap::new(),
            growable: HashSet::new(),
            fn_ret_types: HashMap::new(),
            struct_defs: HashMap::new(),
            type_aliases: HashMap::new(),
            identifiers: BTreeSet::new(),
        }
    }

    pub(crate) fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn record(&mut self, id: NodeId, ty: CType) {
        self.types.insert(id, ty);
    }

    pub(crate) fn type_of(&self, id: NodeId) -> CType {
        self.types.type_of(id).unwrap_or(CType::Unknown)
    }

    pub(crate) fn mention(&mut self, name: &str) {
        if !self.identifiers.contains(name) {
            self.identifiers.insert(name.to_string());
        }
    }

    /// Introduce a binding visible from here to the end of the current scope.
    pub(crate) fn declare(&mut self, name: &str, ty: CType, node: NodeId) -> BindingId {
        let binding = BindingId(self.binding_types.len());
        self.binding_types.push(ty.clone());
        self.var_bindings.insert(name.to_string(), binding);
        self.binding_nodes.insert(node, binding);
        self.record(node, ty);
        self.mention(name);
        binding
    }

    /// Record a use of `name` at `node`, typed by its binding.
    pub(crate) fn use_binding(&mut self, name: &str, node: NodeId) -> CType {
        self.mention(name);
        let ty = match self.var_bindings.get(name).copied() {
            Some(binding) => {
                self.binding_nodes.insert(node, binding);
                self.binding_types[binding.0].clone()
            }
            None => CType::Unknown,
        };
        self.record(node, ty.clone());
        ty
    }

    /// `outer` carries whatever type `inner` carries, now and after promotion.
    pub(crate) fn alias_node(&mut self, outer: NodeId, inner: NodeId) {
        if let Some(binding) = self.binding_nodes.get(&inner).copied() {
            self.binding_nodes.insert(outer, binding);
        }
        let ty = self.type_of(inner);
        self.record(outer, ty);
    }

    pub(crate) fn binding_of(&self, node: NodeId) -> Option<BindingId> {
        self.binding_nodes.get(&node).copied()
    }

    /// An array binding is pushed to or popped from, so it must live on the heap.
    pub(crate) fn mark_growable(&mut self, binding: BindingId) {
        if let CType::Array(array) = &mut self.binding_types[binding.0] {
            array.is_dynamic = true;
            self.growable.insert(binding);
        }
    }

    pub(crate) fn save_scope(&self) -> HashMap<String, BindingId> {
        self.var_bindings.clone()
    }

    pub(crate) fn restore_scope(&mut self, saved: HashMap<String, BindingId>) {
        self.var_bindings = saved;
    }

    pub(crate) fn lookup_field(&self, struct_name: &str, field: &str) -> CType {
        self.struct_defs
            .get(struct_name)
            .and_then(|fields| fields.get(field))
            .cloned()
            .unwrap_or(CType::Unknown)
    }

    /// Promote every node typed by a growable binding and hand back the tables.
    pub(crate) fn finish(mut self) -> Resolved {
        let mut promoted = 0;
        for (node, binding) in &self.binding_nodes {
            if !self.growable.contains(binding) {
                continue;
            }
            if let Some(CType::Array(array)) = self.types.get_mut(*node) {
                array.is_dynamic = true;
                promoted += 1;
            }
        }
        debug!(
            "resolved {} node types, {promoted} promoted to dynamic arrays",
            self.types.len()
        );
        Resolved {
            types: self.types,
            identifiers: self.identifiers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uses_follow_bindings_and_scopes() {
        let mut ctx = LowerCtx::new();
        let decl = ctx.next_id();
        ctx.declare("x", CType::Number, decl);

        let saved = ctx.save_scope();
        let inner = ctx.next_id();
        ctx.declare("x", CType::String, inner);
        let use_inner = ctx.next_id();
        assert_eq!(ctx.use_binding("x", use_inner), CType::String);
        ctx.restore_scope(saved);

        let use_outer = ctx.next_id();
        assert_eq!(ctx.use_binding("x", use_outer), CType::Number);
        let unknown = ctx.next_id();
        assert_eq!(ctx.use_binding("missing", unknown), CType::Unknown);
    }

    #[test]
    fn test_growable_array_promotes_every_use() {
        let mut ctx = LowerCtx::new();
        let decl = ctx.next_id();
        let binding = ctx.declare("a", CType::fixed_array(CType::Number, 3), decl);
        let early_use = ctx.next_id();
        ctx.use_binding("a", early_use);
        let paren = ctx.next_id();
        ctx.alias_node(paren, early_use);

        ctx.mark_growable(binding);
        let resolved = ctx.finish();

        for node in [decl, early_use, paren] {
            let ty = resolved.types.type_of(node).unwrap();
            assert!(ty.is_dynamic_array(), "{node:?} is {ty}");
        }
        assert!(resolved.identifiers.contains("a"));
    }

    #[test]
    fn test_only_arrays_become_growable() {
        let mut ctx = LowerCtx::new();
        let decl = ctx.next_id();
        let binding = ctx.declare("n", CType::Number, decl);
        ctx.mark_growable(binding);
        let resolved = ctx.finish();
        assert_eq!(resolved.types.type_of(decl), Some(CType::Number));
    }
}
