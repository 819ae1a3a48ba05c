//! Releasing heap-owned locals before control leaves a function.

use log::debug;

use crate::error::CodegenError;
use crate::scope::{CVariable, ScopeId, ScopeTree};
use crate::template::{Renderable, Value};
use crate::types::CType;

/// The `free` calls for one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub name: String,
    pub frees: Vec<String>,
}

impl Release {
    /// `None` when the variable does not own heap memory.
    pub fn for_variable(variable: &CVariable) -> Option<Self> {
        let name = &variable.name;
        let frees = match &variable.ty {
            CType::Array(array) if array.is_dynamic => {
                vec![format!("free({name}->data);"), format!("free({name});")]
            }
            CType::Dict(_) => vec![
                format!("free({name}->index->data);"),
                format!("free({name}->index);"),
                format!("free({name}->values->data);"),
                format!("free({name}->values);"),
                format!("free({name});"),
            ],
            CType::Struct { .. } => vec![format!("free({name});")],
            _ => return None,
        };
        Some(Self {
            name: name.clone(),
            frees,
        })
    }
}

impl Renderable for Release {
    fn name(&self) -> &'static str {
        "Release"
    }

    fn template(&self) -> &'static str {
        "{frees {\n}=> {this}}\n"
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "frees" => Some(Value::texts(&self.frees)),
            _ => None,
        }
    }
}

/// Ordered releases for every owned local visible at a point in a function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestructorPlan {
    releases: Vec<Release>,
}

impl DestructorPlan {
    /// Walk from `scope` outward to its function scope. Within a scope,
    /// locals are released in declaration order; `returned` is skipped since
    /// ownership passes to the caller.
    pub fn build(
        scopes: &ScopeTree,
        scope: ScopeId,
        returned: Option<&str>,
    ) -> Result<Self, CodegenError> {
        let mut releases = Vec::new();
        for id in scopes.chain_to_function(scope)? {
            for variable in scopes.variables(id)? {
                if returned == Some(variable.name.as_str()) {
                    continue;
                }
                if let Some(release) = Release::for_variable(variable) {
                    releases.push(release);
                }
            }
        }
        debug!(
            "destructor plan for {scope:?}: [{}]",
            releases
                .iter()
                .map(|r| r.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self { releases })
    }

    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    pub fn into_releases(self) -> Vec<Release> {
        self.releases
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::render;

    fn owned(name: &str) -> CVariable {
        CVariable::new(name, CType::dynamic_array(CType::Number))
    }

    #[test]
    fn test_release_operations_per_type() {
        let dict = Release::for_variable(&CVariable::new("d", CType::dict(CType::Number))).unwrap();
        assert_eq!(
            render(&dict).unwrap(),
            "free(d->index->data);\nfree(d->index);\nfree(d->values->data);\nfree(d->values);\nfree(d);\n"
        );
        let point = CVariable::new("p", CType::Struct { name: "point".into() });
        assert_eq!(Release::for_variable(&point).unwrap().frees, ["free(p);"]);
        assert!(Release::for_variable(&CVariable::new("n", CType::Number)).is_none());
        assert!(
            Release::for_variable(&CVariable::new("f", CType::fixed_array(CType::Number, 3)))
                .is_none()
        );
    }

    #[test]
    fn test_innermost_scope_first_then_declaration_order() {
        let mut scopes = ScopeTree::new();
        let func = scopes.new_function_scope();
        scopes.add_variable(func, owned("a")).unwrap();
        scopes.add_variable(func, owned("b")).unwrap();
        let block = scopes.new_child(func).unwrap();
        scopes.add_variable(block, owned("c")).unwrap();

        let plan = DestructorPlan::build(&scopes, block, None).unwrap();
        let names: Vec<_> = plan.releases().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn test_returned_variable_is_not_released() {
        let mut scopes = ScopeTree::new();
        let func = scopes.new_function_scope();
        scopes.add_variable(func, owned("a")).unwrap();
        scopes.add_variable(func, owned("result")).unwrap();

        let plan = DestructorPlan::build(&scopes, func, Some("result")).unwrap();
        let names: Vec<_> = plan.releases().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a"]);
    }

    #[test]
    fn test_plan_stops_at_function_scope() {
        let mut scopes = ScopeTree::new();
        let outer = scopes.new_function_scope();
        scopes.add_variable(outer, owned("global")).unwrap();
        let func = scopes.new_function_scope();
        scopes.add_variable(func, owned("local")).unwrap();

        let plan = DestructorPlan::build(&scopes, func, None).unwrap();
        assert_eq!(plan.releases().len(), 1);
        assert_eq!(plan.releases()[0].name, "local");
    }
}
