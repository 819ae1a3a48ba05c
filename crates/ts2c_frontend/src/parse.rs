use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_diagnostics::OxcDiagnostic;
use oxc_parser::{ParseOptions, Parser, ParserReturn};
use oxc_span::SourceType;

/// Output of parsing one TypeScript file.
///
/// The `Allocator` handed to [`parse_source`] owns the AST memory and must
/// outlive this value.
pub struct ParseResult<'a> {
    /// The parsed program.
    pub program: Program<'a>,
    /// Syntax errors reported by the parser.
    pub errors: Vec<OxcDiagnostic>,
    /// Whether the parser gave up before the end of the file.
    pub panicked: bool,
}

impl<'a> ParseResult<'a> {
    /// Returns `true` if the file parsed cleanly.
    pub fn is_ok(&self) -> bool {
        !self.panicked && self.errors.is_empty()
    }
}

/// Parse TypeScript source text into an oxc AST.
///
/// `path` only selects the `SourceType`; nothing is read from disk.
/// Parenthesized expressions are preserved so the emitted C keeps the
/// grouping the author wrote.
pub fn parse_source<'a>(
    allocator: &'a Allocator,
    source_text: &'a str,
    path: &Path,
) -> ParseResult<'a> {
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::ts());

    let ParserReturn {
        program,
        errors,
        panicked,
        ..
    } = Parser::new(allocator, source_text, source_type)
        .with_options(ParseOptions {
            preserve_parens: true,
            ..ParseOptions::default()
        })
        .parse();

    ParseResult {
        program,
        errors,
        panicked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_typescript_statements() {
        let allocator = Allocator::default();
        let source = "let x: number = 1;\nfor (const v of [1, 2]) { x += v; }\n";
        let result = parse_source(&allocator, source, Path::new("input.ts"));
        assert!(result.is_ok());
        assert_eq!(result.program.body.len(), 2);
    }

    #[test]
    fn test_reports_syntax_errors() {
        let allocator = Allocator::default();
        let result = parse_source(&allocator, "let = ;", Path::new("broken.ts"));
        assert!(!result.is_ok());
    }
}
