//! Error types.

/// Errors produced by the tracing layer itself.
///
/// Failures of the traced database call are never wrapped in this type; they
/// are observed on the span and handed back to the caller untouched.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `stop_span` was called with nothing on the span stack.
    #[error("no active span to stop")]
    NoActiveSpan,

    /// The context manager refused to open an exit span.
    #[error("failed to create exit span: {0}")]
    SpanCreation(String),

    /// Parameter indices are 1-based.
    #[error("parameter index must be at least 1")]
    InvalidParameterIndex,

    #[error("invalid value {value:?} for configuration key {key}")]
    InvalidConfig { key: &'static str, value: String },

    #[error("unsupported connection url: {0}")]
    UnsupportedUrl(String),

    #[error("malformed connection url: {0}")]
    MalformedUrl(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
