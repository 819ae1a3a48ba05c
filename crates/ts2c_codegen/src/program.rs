//! Whole-file assembly: headers, runtime macros, functions and `main`.

use log::debug;

use crate::error::CodegenError;
use crate::memory::{DestructorPlan, Release};
use crate::scope::CVariable;
use crate::stmt::{Statements, translate_all};
use crate::template::{self, Renderable, Value};
use crate::types::{CType, join_declarator};
use crate::{Function, Module, Param, Stmt, Translator};

/// Headers emitted before any external include, in this order.
const STANDARD_HEADERS: [&str; 4] = ["stdio", "stdlib", "string", "stdint"];

const ARRAY_RUNTIME: &str = r"#define ARRAY(T) struct {\
    int16_t size;\
    int16_t capacity;\
    T *data;\
} *
#define ARRAY_CREATE(array, init_capacity, init_size) do {\
    array = malloc(sizeof(*array)); \
    array->data = malloc((init_capacity) * sizeof(*array->data)); \
    array->capacity = init_capacity; \
    array->size = init_size; \
} while (0)
#define ARRAY_PUSH(array, item) do {\
    if (array->size == array->capacity) { \
        array->capacity *= 2; \
        array->data = realloc(array->data, array->capacity * sizeof(*array->data)); \
    } \
    array->data[array->size++] = item; \
} while (0)
#define ARRAY_POP(array) (array->size != 0 ? array->data[--array->size] : 0)
";

const DICT_RUNTIME: &str = r"#define DICT(T) struct {\
    ARRAY(const char *) index;\
    ARRAY(T) values;\
} *
#define DICT_CREATE(dict, init_capacity) do {\
    dict = malloc(sizeof(*dict)); \
    ARRAY_CREATE(dict->index, init_capacity, 0); \
    ARRAY_CREATE(dict->values, init_capacity, 0); \
} while (0)
int16_t dict_find_pos(const char **keys, int16_t keys_size, const char *key)
{
    int16_t i;
    for (i = 0; i < keys_size; i++)
        if (!strcmp(keys[i], key))
            return i;
    return -1;
}
#define DICT_GET(dict, key) dict->values->data[dict_find_pos(dict->index->data, dict->index->size, key)]
#define DICT_SET(dict, key, value) do {\
    int16_t dict_set_pos = dict_find_pos(dict->index->data, dict->index->size, key); \
    if (dict_set_pos < 0) { \
        ARRAY_PUSH(dict->index, key); \
        ARRAY_PUSH(dict->values, value); \
    } else \
        dict->values->data[dict_set_pos] = value; \
} while (0)
";

fn signature(name: &str, params: &[Param], ret_type: &CType) -> String {
    let params = if params.is_empty() {
        "void".to_string()
    } else {
        params
            .iter()
            .map(|param| param.ty.declare(&param.name))
            .collect::<Vec<_>>()
            .join(", ")
    };
    join_declarator(&ret_type.c_name(), &format!("{name}({params})"))
}

/// A C function definition.
pub struct CFunction {
    signature: String,
    variables: Vec<CVariable>,
    statements: Statements,
    destructors: Vec<Release>,
    is_main: bool,
}

impl CFunction {
    pub fn new(tr: &mut Translator<'_>, function: &Function) -> Result<Self, CodegenError> {
        debug!("translating function `{}`", function.name);
        let signature = signature(&function.name, &function.params, &function.ret_type);
        // Non-void functions release their locals at each `return`.
        let release_at_end = function.ret_type == CType::Void;
        Self::build(tr, signature, &function.body, release_at_end, false)
    }

    /// `int main(void)` around the top-level statements.
    pub fn main(tr: &mut Translator<'_>, top_level: &[Stmt]) -> Result<Self, CodegenError> {
        debug!("translating {} top-level statements into main", top_level.len());
        Self::build(tr, "int main(void)".to_string(), top_level, true, true)
    }

    fn build(
        tr: &mut Translator<'_>,
        signature: String,
        body: &[Stmt],
        release_at_end: bool,
        is_main: bool,
    ) -> Result<Self, CodegenError> {
        let scope = tr.scopes.new_function_scope();
        let statements = translate_all(tr, scope, body)?;
        let variables = tr.scopes.variables(scope)?.to_vec();
        let destructors = if release_at_end {
            DestructorPlan::build(&tr.scopes, scope, None)?.into_releases()
        } else {
            Vec::new()
        };
        Ok(Self {
            signature,
            variables,
            statements,
            destructors,
            is_main,
        })
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl Renderable for CFunction {
    fn name(&self) -> &'static str {
        "CFunction"
    }

    fn template(&self) -> &'static str {
        r#"{signature}
{
    {variables {}=> {this}}
    {statements {}=> {this}}
    {destructors {}=> {this}}
    {#if is_main}
        return 0;
    {/if}
}
"#
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "signature" => Some(Value::text(self.signature.as_str())),
            "variables" => Some(Value::list(&self.variables)),
            "statements" => Some(Value::nodes(&self.statements)),
            "destructors" => Some(Value::list(&self.destructors)),
            "is_main" => Some(Value::Flag(self.is_main)),
            _ => None,
        }
    }
}

/// The translation unit.
pub struct CProgram {
    headers: Vec<String>,
    uses_arrays: bool,
    uses_dicts: bool,
    prototypes: Vec<String>,
    functions: Vec<CFunction>,
    main: CFunction,
}

impl CProgram {
    pub fn new(tr: &mut Translator<'_>, module: &Module) -> Result<Self, CodegenError> {
        let functions = module
            .functions
            .iter()
            .map(|function| CFunction::new(tr, function))
            .collect::<Result<Vec<_>, _>>()?;
        let main = CFunction::main(tr, &module.top_level)?;

        let signature_types = module
            .functions
            .iter()
            .flat_map(|f| f.params.iter().map(|p| &p.ty).chain(std::iter::once(&f.ret_type)));
        let types: Vec<&CType> = tr
            .scopes
            .all_variables()
            .map(|v| &v.ty)
            .chain(signature_types)
            .collect();

        let uses_dicts = types.iter().any(|ty| ty.uses_dict_runtime());
        let uses_arrays = uses_dicts || types.iter().any(|ty| ty.uses_array_runtime());
        let uses_heap = uses_arrays || types.iter().any(|ty| ty.is_heap_owned());
        let uses_fixed_width = uses_arrays
            || types
                .iter()
                .any(|ty| matches!(ty, CType::Number | CType::Boolean) || ty.as_array().is_some());

        if uses_heap {
            tr.includes.register("stdlib");
        }
        if uses_dicts {
            tr.includes.register("string");
        }
        if uses_fixed_width {
            tr.includes.register("stdint");
        }

        let mut headers: Vec<String> = STANDARD_HEADERS
            .iter()
            .filter(|header| tr.includes.contains(header))
            .map(|header| header.to_string())
            .collect();
        headers.extend(
            tr.includes
                .iter()
                .filter(|header| !STANDARD_HEADERS.contains(header))
                .map(str::to_string),
        );
        debug!("headers: {}", headers.join(", "));

        let prototypes = functions.iter().map(|f| f.signature().to_string()).collect();
        Ok(Self {
            headers,
            uses_arrays,
            uses_dicts,
            prototypes,
            functions,
            main,
        })
    }

    pub fn render(&self) -> Result<String, CodegenError> {
        Ok(template::render(self)?)
    }
}

impl Renderable for CProgram {
    fn name(&self) -> &'static str {
        "CProgram"
    }

    fn template(&self) -> &'static str {
        r#"{headers {}=> #include <{this}.h>
}
{#if uses_arrays}

    {array_runtime}
{/if}
{#if uses_dicts}

    {dict_runtime}
{/if}
{#if has_functions}

    {prototypes {}=> {this};
    }

    {functions {
    }=> {this}}
{/if}

{main}
"#
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "headers" => Some(Value::texts(&self.headers)),
            "uses_arrays" => Some(Value::Flag(self.uses_arrays)),
            "array_runtime" => Some(Value::text(ARRAY_RUNTIME)),
            "uses_dicts" => Some(Value::Flag(self.uses_dicts)),
            "dict_runtime" => Some(Value::text(DICT_RUNTIME)),
            "has_functions" => Some(Value::Flag(!self.functions.is_empty())),
            "prototypes" => Some(Value::texts(&self.prototypes)),
            "functions" => Some(Value::list(&self.functions)),
            "main" => Some(Value::Node(&self.main)),
            _ => None,
        }
    }
}

/// Translate and render a whole module.
pub fn translate_module(tr: &mut Translator<'_>, module: &Module) -> Result<String, CodegenError> {
    CProgram::new(tr, module)?.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::CExprTranslator;
    use crate::testing::Builder;
    use crate::types::TypeTable;
    use crate::{NodeId, Span};

    fn function(name: &str, params: Vec<Param>, ret_type: CType, body: Vec<Stmt>) -> Function {
        Function {
            id: NodeId(1000),
            span: Span::default(),
            name: name.to_string(),
            params,
            ret_type,
            body,
        }
    }

    #[test]
    fn test_signatures() {
        let params = vec![
            Param {
                id: NodeId(1),
                name: "n".into(),
                ty: CType::Number,
            },
            Param {
                id: NodeId(2),
                name: "s".into(),
                ty: CType::String,
            },
        ];
        assert_eq!(
            signature("f", &params, &CType::Boolean),
            "uint8_t f(int16_t n, const char *s)"
        );
        assert_eq!(signature("g", &[], &CType::String), "const char *g(void)");
        assert_eq!(signature("h", &[], &CType::Void), "void h(void)");
    }

    #[test]
    fn test_program_with_function_and_main() {
        let b = Builder::new();
        let n = b.ident("n");
        let mut table = TypeTable::new();
        table.insert(n.id, CType::Number);
        let sum = b.binary(crate::BinaryOp::Add, n, b.number("1"));
        let inc = function(
            "inc",
            vec![Param {
                id: NodeId(500),
                name: "n".into(),
                ty: CType::Number,
            }],
            CType::Number,
            vec![b.ret(Some(sum))],
        );
        let log = b.call(
            b.member(b.ident("console"), "log"),
            vec![b.call(b.ident("inc"), vec![b.number("41")])],
        );
        let call = log.clone();
        if let crate::ExprKind::Call { args, .. } = &call.kind {
            table.insert(args[0].id, CType::Number);
        }
        let module = Module {
            functions: vec![inc],
            top_level: vec![b.expr_stmt(log)],
        };

        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let text = translate_module(&mut tr, &module).unwrap();
        assert_eq!(
            text,
            "#include <stdio.h>\n#include <stdint.h>\n\n\
             int16_t inc(int16_t n);\n\n\
             int16_t inc(int16_t n)\n{\n    return n + 1;\n}\n\n\
             int main(void)\n{\n    printf(\"%d\\n\", inc(41));\n    return 0;\n}\n"
        );
    }

    #[test]
    fn test_main_releases_owned_locals() {
        let b = Builder::new();
        let decl = b.declarator("xs", Some(b.array(vec![b.number("1")])));
        let mut table = TypeTable::new();
        table.insert(decl.id, CType::dynamic_array(CType::Number));
        let module = Module {
            functions: vec![],
            top_level: vec![b.var_decl(vec![decl])],
        };

        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let text = translate_module(&mut tr, &module).unwrap();
        assert!(text.starts_with("#include <stdlib.h>\n#include <stdint.h>\n\n#define ARRAY(T)"));
        assert!(!text.contains("#define DICT(T)"));
        assert!(text.ends_with(
            "int main(void)\n{\n    ARRAY(int16_t) xs;\n    ARRAY_CREATE(xs, 2, 1);\n    xs->data[0] = 1;\n    free(xs->data);\n    free(xs);\n    return 0;\n}\n"
        ));
    }

    #[test]
    fn test_dict_runtime_pulls_in_string_and_array() {
        let b = Builder::new();
        let decl = b.declarator("d", Some(b.object(vec![("a", b.number("1"))])));
        let mut table = TypeTable::new();
        table.insert(decl.id, CType::dict(CType::Number));
        let module = Module {
            functions: vec![],
            top_level: vec![b.var_decl(vec![decl])],
        };

        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let text = translate_module(&mut tr, &module).unwrap();
        assert!(text.starts_with(
            "#include <stdlib.h>\n#include <string.h>\n#include <stdint.h>\n\n#define ARRAY(T)"
        ));
        assert!(text.contains("#define DICT_SET(dict, key, value)"));
        assert!(text.contains("    DICT_SET(d, \"a\", 1);\n"));
    }

    #[test]
    fn test_external_includes_follow_standard_headers() {
        let b = Builder::new();
        let module = Module {
            functions: vec![],
            top_level: vec![
                b.stmt(crate::StmtKind::Import {
                    source: "ts2c-target/arduino".into(),
                }),
                b.expr_stmt(b.call(
                    b.member(b.ident("console"), "log"),
                    vec![b.string("hi")],
                )),
            ],
        };
        let table = TypeTable::new();
        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let text = translate_module(&mut tr, &module).unwrap();
        assert!(text.starts_with("#include <stdio.h>\n#include <arduino.h>\n\nint main(void)\n"));
    }

    #[test]
    fn test_void_function_releases_at_end() {
        let b = Builder::new();
        let decl = b.declarator("xs", Some(b.array(vec![])));
        let mut table = TypeTable::new();
        table.insert(decl.id, CType::dynamic_array(CType::Number));
        let f = function("work", vec![], CType::Void, vec![b.var_decl(vec![decl])]);

        let exprs = CExprTranslator;
        let mut tr = Translator::new(&table, &exprs);
        let func = CFunction::new(&mut tr, &f).unwrap();
        assert_eq!(
            template::render(&func).unwrap(),
            "void work(void)\n{\n    ARRAY(int16_t) xs;\n    ARRAY_CREATE(xs, 2, 0);\n    free(xs->data);\n    free(xs);\n}\n"
        );
    }
}
