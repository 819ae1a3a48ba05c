use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;

use crate::NodeId;

const ITERATOR_NAMES: [&str; 6] = ["i", "j", "k", "l", "m", "n"];

/// Program-wide name allocator for compiler-introduced locals.
///
/// Seeded with every identifier the source uses, so generated names never
/// shadow or collide with user names. Allocation is memoized per node.
#[derive(Debug, Default)]
pub struct SymbolTable {
    used: HashSet<String>,
    iterators: HashMap<NodeId, String>,
    temporaries: HashMap<(NodeId, String), String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a name as taken.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.used.insert(name.into());
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Loop counter for `node`: `i`..`n`, then `i_2`..`n_2`, and so on.
    pub fn fresh_iterator(&mut self, node: NodeId) -> String {
        if let Some(name) = self.iterators.get(&node) {
            return name.clone();
        }
        let mut round = 1usize;
        let name = loop {
            let free = ITERATOR_NAMES.iter().find_map(|base| {
                let candidate = if round == 1 {
                    base.to_string()
                } else {
                    format!("{base}_{round}")
                };
                (!self.is_reserved(&candidate)).then_some(candidate)
            });
            if let Some(name) = free {
                break name;
            }
            round += 1;
        };
        self.used.insert(name.clone());
        self.iterators.insert(node, name.clone());
        name
    }

    /// Temporary for `node`: `hint`, then `hint_2`, `hint_3`, ...
    pub fn fresh_temporary(&mut self, node: NodeId, hint: &str) -> String {
        let key = (node, hint.to_string());
        if let Some(name) = self.temporaries.get(&key) {
            return name.clone();
        }
        let mut name = hint.to_string();
        let mut suffix = 2usize;
        while self.is_reserved(&name) {
            name = format!("{hint}_{suffix}");
            suffix += 1;
        }
        self.used.insert(name.clone());
        self.temporaries.insert(key, name.clone());
        name
    }
}

/// Headers the generated file needs, without the `.h` suffix, in
/// registration order.
#[derive(Debug, Default)]
pub struct IncludeRegistry {
    headers: IndexSet<String>,
}

impl IncludeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the header was not registered before.
    pub fn register(&mut self, header: impl Into<String>) -> bool {
        self.headers.insert(header.into())
    }

    pub fn contains(&self, header: &str) -> bool {
        self.headers.contains(header)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iterator_sequence_skips_used_names() {
        let mut symbols = SymbolTable::new();
        symbols.reserve("j");
        assert_eq!(symbols.fresh_iterator(NodeId(1)), "i");
        assert_eq!(symbols.fresh_iterator(NodeId(2)), "k");
        for node in 3..6 {
            symbols.fresh_iterator(NodeId(node));
        }
        assert_eq!(symbols.fresh_iterator(NodeId(6)), "i_2");
    }

    #[test]
    fn test_iterator_is_idempotent_per_node() {
        let mut symbols = SymbolTable::new();
        let first = symbols.fresh_iterator(NodeId(10));
        assert_eq!(symbols.fresh_iterator(NodeId(10)), first);
        assert_ne!(symbols.fresh_iterator(NodeId(11)), first);
    }

    #[test]
    fn test_temporaries_get_suffixes() {
        let mut symbols = SymbolTable::new();
        symbols.reserve("tmp_switch");
        assert_eq!(symbols.fresh_temporary(NodeId(1), "tmp_switch"), "tmp_switch_2");
        assert_eq!(symbols.fresh_temporary(NodeId(2), "tmp_switch"), "tmp_switch_3");
        assert_eq!(symbols.fresh_temporary(NodeId(1), "tmp_switch"), "tmp_switch_2");
        assert!(symbols.is_reserved("tmp_switch_3"));
        assert!(!symbols.is_reserved("tmp_switch_4"));
    }

    #[test]
    fn test_include_registry_keeps_first_registration() {
        let mut includes = IncludeRegistry::new();
        assert!(includes.register("stdio"));
        assert!(includes.register("arduino/Arduino"));
        assert!(!includes.register("stdio"));
        assert_eq!(includes.iter().collect::<Vec<_>>(), ["stdio", "arduino/Arduino"]);
    }
}
