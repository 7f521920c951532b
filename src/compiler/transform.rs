//! Source transform capability - strips strict-typing superset syntax.

use thiserror::Error;

/// Syntax error surfaced by the source transform.
///
/// The transform never swallows these; the pipeline converts them into
/// diagnostic strings at the compile boundary.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransformError(pub String);

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Strict-superset to base-language source transform.
///
/// `transform` is pure and stateless: semantically equivalent base-language
/// source out, or a syntax error.
pub trait TransformSource: Send + Sync {
    fn transform(&self, source: &str) -> Result<String, TransformError>;
}

/// No-op transform for hosts that only feed base-language source.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl TransformSource for PassThrough {
    fn transform(&self, source: &str) -> Result<String, TransformError> {
        Ok(source.to_owned())
    }
}
