//! Gateway between a chat front end and a managed remote agent.
//!
//! Bundles the workspace crates behind feature flags. With the default
//! `connect` feature, [`connect`] turns a loaded
//! [`GatewayConfig`](agent_config::GatewayConfig) into a ready
//! [`AgentGateway`](agent_kernel::AgentGateway) backed by the HTTP clients.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use agent_primitives as primitives;

/// Turn orchestration (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use agent_kernel as kernel;

/// Agent runtime contract and HTTP clients (enabled by `adapters` feature).
#[cfg(feature = "adapters")]
pub use agent_adapters as adapters;

/// Tool adapter bootstrap (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use agent_tools as tools;

/// Knowledge base retrieval (enabled by `retrieval` feature).
#[cfg(feature = "retrieval")]
pub use agent_retrieval as retrieval;

/// Output safety filter (enabled by `policy` feature).
#[cfg(feature = "policy")]
pub use agent_policy as policy;

/// Metrics and feedback (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use agent_telemetry as telemetry;

/// Prompt template cache (enabled by `prompts` feature).
#[cfg(feature = "prompts")]
pub use agent_prompts as prompts;

/// Environment configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use agent_config as config;

#[cfg(feature = "connect")]
mod connect;

#[cfg(feature = "connect")]
pub use connect::{ConnectError, build_telemetry, connect, feedback_telemetry};
