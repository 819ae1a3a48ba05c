use std::path::{Path, PathBuf};

use log::{debug, info};
use oxc_allocator::Allocator;
use thiserror::Error;

use ts2c_codegen::expr::CExprTranslator;
use ts2c_codegen::program::translate_module;
use ts2c_codegen::{CodegenError, CodegenOptions, Translator};
use ts2c_frontend::parse;
use ts2c_frontend::semantic;

use super::context::{LowerCtx, LowerError};
use super::lower_program;
use super::utils::line_col;

/// Compilation options.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Output file path. Defaults to the input path with a `.c` extension.
    pub output: Option<PathBuf>,
    /// Leave writing to the caller instead of creating a file.
    pub to_stdout: bool,
    /// Settings forwarded to the translator.
    pub codegen: CodegenOptions,
}

/// Errors that can occur during compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Parse errors from the frontend.
    #[error("{}", prefixed("parse error", .0))]
    Parse(Vec<String>),
    /// Semantic analysis errors.
    #[error("{}", prefixed("semantic error", .0))]
    Semantic(Vec<String>),
    /// A construct the lowering does not handle.
    #[error("{location}: {message}")]
    Lowering { location: String, message: String },
    /// The translator rejected the program.
    #[error("{location}: {source}")]
    Codegen {
        location: String,
        #[source]
        source: CodegenError,
    },
}

fn prefixed(prefix: &str, messages: &[String]) -> String {
    messages
        .iter()
        .map(|message| format!("{prefix}: {message}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn location(path: &Path, source_text: &str, offset: Option<u32>) -> String {
    match offset {
        Some(offset) => {
            let (line, column) = line_col(source_text, offset);
            format!("{}:{line}:{column}", path.display())
        }
        None => path.display().to_string(),
    }
}

/// Where `compile_file` writes its output, or `None` for stdout.
pub fn output_path(input: &Path, options: &CompileOptions) -> Option<PathBuf> {
    if options.to_stdout {
        return None;
    }
    Some(
        options
            .output
            .clone()
            .unwrap_or_else(|| input.with_extension("c")),
    )
}

/// Compile a TypeScript file to C.
///
/// Returns the generated C text. Unless `to_stdout` is set it is also
/// written to [`output_path`].
pub fn compile_file(path: &Path, options: &CompileOptions) -> Result<String, CompileError> {
    info!("compiling {}", path.display());
    let source_text = std::fs::read_to_string(path)?;
    let c_text = compile_source(&source_text, path, &options.codegen)?;
    if let Some(output) = output_path(path, options) {
        std::fs::write(&output, &c_text)?;
        info!("wrote {}", output.display());
    }
    Ok(c_text)
}

/// Compile TypeScript source text to C.
///
/// This runs the full pipeline:
/// 1. Parse (ts2c_frontend)
/// 2. Semantic checks (ts2c_frontend)
/// 3. Lower AST -> IR and resolve node types
/// 4. Translate and render the C translation unit (ts2c_codegen)
///
/// `path` names the source in diagnostics and selects the source type.
pub fn compile_source(
    source_text: &str,
    path: &Path,
    options: &CodegenOptions,
) -> Result<String, CompileError> {
    // Parse
    let allocator = Allocator::default();
    let parse_result = parse::parse_source(&allocator, source_text, path);
    if !parse_result.is_ok() {
        return Err(CompileError::Parse(
            parse_result
                .errors
                .iter()
                .map(|e| format!("{}: {e}", path.display()))
                .collect(),
        ));
    }

    // Semantic analysis
    let sem_result = semantic::analyze_semantics(&parse_result.program);
    if !sem_result.is_ok() {
        return Err(CompileError::Semantic(
            sem_result
                .errors
                .iter()
                .map(|e| format!("{}: {e}", path.display()))
                .collect(),
        ));
    }

    // Lower AST -> IR, resolving types as we go
    info!("lowering {}", path.display());
    let mut ctx = LowerCtx::new();
    let module = lower_program(&parse_result.program, &mut ctx).map_err(
        |LowerError { span, message }| CompileError::Lowering {
            location: location(path, source_text, Some(span.start)),
            message,
        },
    )?;
    let resolved = ctx.finish();

    // Translate
    info!("translating {}", path.display());
    let exprs = CExprTranslator;
    let mut translator = Translator::with_options(&resolved.types, &exprs, options.clone());
    for name in &resolved.identifiers {
        translator.symbols.reserve(name.as_str());
    }
    debug!("reserved {} source identifiers", resolved.identifiers.len());
    translate_module(&mut translator, &module).map_err(|source| CompileError::Codegen {
        location: location(path, source_text, source.span().map(|span| span.start)),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> String {
        let _ = env_logger::builder().is_test(true).try_init();
        match compile_source(source, Path::new("test.ts"), &CodegenOptions::default()) {
            Ok(text) => text,
            Err(err) => panic!("compilation failed: {err}"),
        }
    }

    fn compile_err(source: &str) -> CompileError {
        compile_source(source, Path::new("test.ts"), &CodegenOptions::default())
            .err()
            .expect("compilation should fail")
    }

    #[test]
    fn test_top_level_statements_form_main() {
        let c = compile("let x: number = 1;\nconsole.log(x);\n");
        assert!(c.contains("#include <stdio.h>"), "{c}");
        assert!(c.contains("int main(void)"), "{c}");
        assert!(c.contains("int16_t x;"), "{c}");
        assert!(c.contains("x = 1;"), "{c}");
        assert!(c.contains("printf(\"%d\\n\", x);"), "{c}");
        assert!(c.contains("return 0;"), "{c}");
    }

    #[test]
    fn test_functions_get_prototypes_and_typed_calls() {
        let c = compile(
            "function twice(n: number): number {\n    return n * 2;\n}\nconsole.log(twice(4));\n",
        );
        assert!(c.contains("int16_t twice(int16_t n);"), "{c}");
        assert!(c.contains("return n * 2;"), "{c}");
        assert!(c.contains("printf(\"%d\\n\", twice(4));"), "{c}");
    }

    #[test]
    fn test_for_of_over_fixed_array_is_bounded_by_length() {
        let c = compile(
            "let xs = [1, 2, 3];\nlet total = 0;\nfor (const v of xs) {\n    total += v;\n}\n",
        );
        assert!(c.contains("int16_t xs[3];"), "{c}");
        assert!(c.contains("< 3;"), "{c}");
        assert!(c.contains("total += v;"), "{c}");
    }

    #[test]
    fn test_pushed_array_becomes_dynamic() {
        let c = compile(
            "let xs = [1, 2];\nxs.push(3);\nfor (const x of xs) {\n    console.log(x);\n}\n",
        );
        assert!(c.contains("ARRAY_CREATE"), "{c}");
        assert!(c.contains("ARRAY_PUSH(xs, 3);"), "{c}");
        assert!(c.contains("xs->size"), "{c}");
        assert!(c.contains("free(xs->data);"), "{c}");
    }

    #[test]
    fn test_string_switch_is_emulated() {
        let c = compile(
            "let s: string = \"b\";\nswitch (s) {\n    case \"a\":\n        break;\n    case \"b\":\n        break;\n}\n",
        );
        assert!(c.contains("#include <string.h>"), "{c}");
        assert!(c.contains("!strcmp(s, \"a\") ? 0"), "{c}");
        assert!(c.contains("switch (tmp_switch)"), "{c}");
    }

    #[test]
    fn test_for_in_over_record() {
        let c = compile(
            "let d: Record<string, number> = { a: 1, b: 2 };\nfor (const k in d) {\n    console.log(k);\n}\n",
        );
        assert!(c.contains("DICT_CREATE"), "{c}");
        assert!(c.contains("d->index->size"), "{c}");
        assert!(c.contains("k = d->index->data["), "{c}");
    }

    #[test]
    fn test_marked_import_becomes_include() {
        let c = compile("import { led } from \"ts2c-target/board\";\nled();\n");
        assert!(c.contains("#include <board.h>"), "{c}");
        assert!(c.contains("led();"), "{c}");
    }

    #[test]
    fn test_unsupported_statement_is_located() {
        let err = compile_err("let a = 1;\nthrow a;\n");
        match err {
            CompileError::Lowering { location, message } => {
                assert_eq!(location, "test.ts:2:1");
                assert!(message.contains("throw"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_syntax_errors_are_reported() {
        let err = compile_err("let = ;");
        assert!(matches!(err, CompileError::Parse(_)));
        assert!(err.to_string().starts_with("parse error: test.ts:"));
    }

    #[test]
    fn test_for_of_over_number_is_rejected_with_location() {
        let err = compile_err("let n = 3;\nfor (const v of n) {\n}\n");
        match err {
            CompileError::Codegen { location, source } => {
                assert!(location.starts_with("test.ts:2:"), "{location}");
                assert!(matches!(source, CodegenError::Unsupported { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
