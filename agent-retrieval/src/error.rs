use agent_primitives::UpstreamError;
use thiserror::Error;

/// Result alias for retrieval operations.
pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// Errors that can occur while querying the knowledge store.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The query text was empty after trimming.
    #[error("retrieval query cannot be empty")]
    EmptyQuery,

    /// The knowledge store call failed.
    #[error("knowledge store request failed: {0}")]
    Upstream(#[from] UpstreamError),
}
