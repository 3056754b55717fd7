use agent_primitives::UpstreamError;
use thiserror::Error;

/// Result alias for guardrail operations.
pub type GuardrailResult<T> = Result<T, GuardrailError>;

/// Errors that can occur while screening content.
#[derive(Debug, Error)]
pub enum GuardrailError {
    /// Guardrail configuration failed validation.
    #[error("invalid guardrail configuration: {0}")]
    InvalidConfig(&'static str),

    /// The guardrail service call failed.
    #[error("guardrail request failed: {0}")]
    Upstream(#[from] UpstreamError),
}
