//! Per-turn state machine.

use thiserror::Error;
use tracing::debug;

/// States a turn moves through between `prepare` and the returned result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Nothing has happened yet.
    Idle,
    /// Template and retrieval context are assembled.
    Prepared,
    /// The agent stream is open and being drained.
    Streaming,
    /// The stream is drained and provenance has been classified.
    ProvenanceChecked,
    /// Tool-sourced output was re-screened by the safety filter.
    FilterApplied,
    /// The turn result has been produced.
    Finalized,
}

impl TurnState {
    /// Returns `true` once the turn has produced its result.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized)
    }
}

/// Events that drive [`TurnState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// Request assembly finished.
    Prepare,
    /// The agent accepted the invocation.
    OpenStream,
    /// The stream reached its natural end.
    StreamDrained,
    /// The safety filter returned a verdict.
    ApplyFilter,
    /// The result was assembled.
    Finalize,
}

/// Tracks the state of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnLifecycle {
    state: TurnState,
}

impl Default for TurnLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnLifecycle {
    /// Starts a lifecycle in [`TurnState::Idle`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: TurnState::Idle,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Applies an event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`TurnStateError::InvalidTransition`] when the event is not
    /// allowed from the current state.
    pub fn transition(&mut self, event: TurnEvent) -> Result<TurnState, TurnStateError> {
        let next = match (self.state, event) {
            (TurnState::Idle, TurnEvent::Prepare) => TurnState::Prepared,
            (TurnState::Prepared, TurnEvent::OpenStream) => TurnState::Streaming,
            (TurnState::Streaming, TurnEvent::StreamDrained) => TurnState::ProvenanceChecked,
            (TurnState::ProvenanceChecked, TurnEvent::ApplyFilter) => TurnState::FilterApplied,
            (TurnState::ProvenanceChecked | TurnState::FilterApplied, TurnEvent::Finalize) => {
                TurnState::Finalized
            }
            (from, event) => return Err(TurnStateError::InvalidTransition { from, event }),
        };

        debug!(from = ?self.state, to = ?next, ?event, "turn state transition");
        self.state = next;
        Ok(next)
    }
}

/// Errors emitted by the turn state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnStateError {
    /// Transition was not permitted from the current state.
    #[error("invalid turn transition from {from:?} via {event:?}")]
    InvalidTransition {
        /// State prior to the attempted transition.
        from: TurnState,
        /// Event that triggered the failure.
        event: TurnEvent,
    },
}
