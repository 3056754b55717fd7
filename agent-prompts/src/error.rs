//! Errors raised while resolving prompt templates.

use agent_primitives::UpstreamError;
use thiserror::Error;

/// Result alias for prompt operations.
pub type PromptResult<T> = Result<T, PromptError>;

/// Errors surfaced by the template cache and its library client.
#[derive(Debug, Error)]
pub enum PromptError {
    /// Template configuration failed validation.
    #[error("invalid prompt configuration: {0}")]
    InvalidConfig(&'static str),

    /// The prompt library call failed.
    #[error("prompt library request failed: {0}")]
    Upstream(#[from] UpstreamError),

    /// The library returned a template with no usable text.
    #[error("prompt template `{name}` has empty text")]
    EmptyTemplate {
        /// Name reported by the library.
        name: String,
    },
}
