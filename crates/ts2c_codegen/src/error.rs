use thiserror::Error;

use crate::scope::ScopeId;
use crate::template::TemplateError;
use crate::Span;

/// Errors raised while translating statements to C.
///
/// `Template`, `MissingType` and `UnknownScope` are contract violations
/// between the translator and its collaborators; `Unsupported` is a source
/// construct the backend cannot lower. None of them are recoverable for the
/// current translation unit.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("{span}: no type is known for {what}")]
    MissingType { span: Span, what: String },

    #[error("scope {0:?} does not exist")]
    UnknownScope(ScopeId),

    #[error("{span}: unsupported {construct}: {detail}")]
    Unsupported {
        span: Span,
        construct: &'static str,
        detail: String,
    },
}

impl CodegenError {
    pub fn unsupported(span: Span, construct: &'static str, detail: impl Into<String>) -> Self {
        CodegenError::Unsupported {
            span,
            construct,
            detail: detail.into(),
        }
    }

    /// Source location of the offending node, when the error has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            CodegenError::MissingType { span, .. } | CodegenError::Unsupported { span, .. } => {
                Some(*span)
            }
            CodegenError::Template(_) | CodegenError::UnknownScope(_) => None,
        }
    }
}
