use agent_primitives::UpstreamError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors raised by sinks and feedback stores.
///
/// Metric errors never reach a turn; the dispatcher logs them and moves on.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Local I/O failed.
    #[error("telemetry i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded.
    #[error("telemetry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A remote monitoring backend rejected the call.
    #[error("monitoring backend error: {0}")]
    Upstream(#[from] UpstreamError),

    /// The dispatcher task is no longer running.
    #[error("telemetry dispatcher is closed")]
    Closed,

    /// Feedback was submitted but no store is configured.
    #[error("no feedback store configured")]
    FeedbackDisabled,
}
