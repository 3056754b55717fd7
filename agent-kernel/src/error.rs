//! Errors surfaced by a turn.

use agent_adapters::AdapterError;
use agent_policy::GuardrailError;
use agent_prompts::PromptError;
use agent_retrieval::RetrievalError;
use thiserror::Error;

use crate::state::TurnStateError;

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, TurnError>;

/// A turn failure, tagged with the stage that produced it.
///
/// Any failure aborts the turn: no partial answer is returned and no
/// telemetry is emitted.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The prompt template could not be fetched.
    #[error("prompt template stage failed: {0}")]
    Template(#[from] PromptError),
    /// Knowledge base retrieval failed.
    #[error("retrieval stage failed: {0}")]
    Retrieval(#[from] RetrievalError),
    /// The agent invocation or its stream failed.
    #[error("agent stage failed: {0}")]
    Agent(#[from] AdapterError),
    /// The output safety filter failed.
    #[error("safety filter stage failed: {0}")]
    Guardrail(#[from] GuardrailError),
    /// The turn was driven out of order.
    #[error(transparent)]
    State(#[from] TurnStateError),
}

impl TurnError {
    /// Name of the failing stage, for logs.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Template(_) => "template",
            Self::Retrieval(_) => "retrieval",
            Self::Agent(_) => "agent",
            Self::Guardrail(_) => "guardrail",
            Self::State(_) => "state",
        }
    }
}
