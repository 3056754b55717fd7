//! Remote service adapters for the agent gateway.
//!
//! [`traits`] defines the streaming [`AgentRuntime`] contract. The remaining
//! modules implement it, and the client traits owned by the prompt,
//! retrieval, policy and telemetry crates, over JSON/HTTPS.

#![warn(missing_docs, clippy::pedantic)]

pub mod agent_runtime;
pub mod http_client;
pub mod services;
pub mod traits;

pub use agent_runtime::HttpAgentRuntime;
pub use http_client::{DEFAULT_TIMEOUT, ServiceEndpoint};
pub use services::{
    HttpFeedbackStore, HttpGuardrailClient, HttpKnowledgeStore, HttpMetricSink, HttpPromptLibrary,
};
pub use traits::{
    AdapterError, AdapterResult, AgentEvent, AgentEventStream, AgentRuntime, InvocationAttributes,
    InvokeAgentRequest, KnowledgeBaseReference, RegisterToolsRequest, SessionState,
};
