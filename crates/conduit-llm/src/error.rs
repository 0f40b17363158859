use thiserror::Error;

/// Boxed source error carried by adaptation failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while adapting a request, response, or stream
#[derive(Debug, Error)]
pub enum LlmError {
    /// Model id or provider credentials are missing
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport cannot serve the routed provider
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Model id is not in any provider table and no compatibility URL was given
    #[error("unsupported model: {model}")]
    UnsupportedModel { model: String },

    /// Request is malformed for the target provider
    #[error("validation error: {0}")]
    Validation(String),

    /// Vendor response or event cannot be mapped to canonical form
    #[error("adaptation error: {message}")]
    Adaptation {
        /// What could not be adapted
        message: String,
        /// Underlying cause, when there is one
        #[source]
        source: Option<BoxError>,
    },

    /// Upstream vendor returned an error or could not be reached
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Error while reading the vendor stream
    #[error("streaming error: {0}")]
    Streaming(String),
}

impl LlmError {
    /// Adaptation failure without an underlying cause
    pub fn adaptation(message: impl Into<String>) -> Self {
        Self::Adaptation {
            message: message.into(),
            source: None,
        }
    }

    /// Adaptation failure wrapping the underlying cause
    pub fn adaptation_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Adaptation {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Whether a caller may reasonably retry the call
    ///
    /// This layer never retries on its own; the flag is advisory for callers
    /// wrapping the client in their own backoff policy.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Streaming(_))
    }
}

/// Tool-call arguments that are not valid JSON
///
/// Never surfaces from the public API: the normalizer logs it and degrades the
/// arguments to an empty object.
#[derive(Debug, Error)]
#[error("failed to parse tool arguments: {source}")]
pub struct ToolArgumentParseError {
    #[from]
    source: serde_json::Error,
}
