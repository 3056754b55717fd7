//! Core shared types for the agent gateway.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod identity;
mod ids;

/// Error types and result aliases shared across the workspace.
pub use error::{Error, Result, UpstreamError, UpstreamResult};
/// Identity of the fronted remote agent.
pub use identity::{AgentIdentity, AgentIdentityBuilder};
/// Conversation identifiers supplied by the front end.
pub use ids::ConversationId;
