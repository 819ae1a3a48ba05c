use oxc_ast::ast::Program;
use oxc_diagnostics::OxcDiagnostic;
use oxc_semantic::{Semantic, SemanticBuilder, SemanticBuilderReturn};

/// Output of the semantic pass over a parsed program.
pub struct SemanticResult<'a> {
    /// Scopes, symbols and references built by oxc.
    pub semantic: Semantic<'a>,
    /// Errors such as redeclarations caught while building scopes.
    pub errors: Vec<OxcDiagnostic>,
}

impl<'a> SemanticResult<'a> {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run oxc's semantic analysis with syntax-error checking enabled.
///
/// The translator relies on this pass to reject programs oxc considers
/// invalid before any C is produced.
pub fn analyze_semantics<'a>(program: &'a Program<'a>) -> SemanticResult<'a> {
    let SemanticBuilderReturn { semantic, errors } = SemanticBuilder::new()
        .with_check_syntax_error(true)
        .build(program);

    SemanticResult { semantic, errors }
}
