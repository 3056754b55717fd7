//! Agent runtime contract and its wire shapes.

use std::pin::Pin;
use std::time::Duration;

use agent_policy::GuardrailParameters;
use agent_primitives::{AgentIdentity, ConversationId, UpstreamError};
use agent_retrieval::RetrievedPassage;
use agent_tools::ToolDescriptor;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result alias used by agent runtime adapters.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Streaming response emitted by [`AgentRuntime::invoke`].
pub type AgentEventStream = Pin<Box<dyn Stream<Item = AdapterResult<AgentEvent>> + Send>>;

/// Error type shared by adapter implementations.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Adapter is misconfigured or missing credentials.
    #[error("adapter not configured: {reason}")]
    Configuration {
        /// Additional context for the failure.
        reason: String,
    },

    /// The request could not be encoded or was rejected as invalid.
    #[error("invalid agent request: {reason}")]
    InvalidRequest {
        /// Reason describing why the request could not be processed.
        reason: String,
    },

    /// Transport-level failures (network, protocol, timeouts).
    #[error("adapter transport error: {reason}")]
    Transport {
        /// Additional context about the error.
        reason: String,
    },

    /// The agent or alias does not exist.
    #[error("agent resource not found: {resource}")]
    NotFound {
        /// Missing resource.
        resource: String,
    },

    /// The caller may not invoke the agent.
    #[error("agent permission denied: {reason}")]
    PermissionDenied {
        /// Detail returned by the service.
        reason: String,
    },

    /// The service rejected the request due to rate limiting.
    #[error("adapter rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Suggested delay before retrying.
        retry_after: Option<Duration>,
    },

    /// The service returned a malformed or failed response.
    #[error("adapter response error: {reason}")]
    Response {
        /// Additional context about the response failure.
        reason: String,
    },
}

impl AdapterError {
    /// Convenience constructor for invalid requests.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for configuration issues.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for malformed responses.
    #[must_use]
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }
}

impl From<UpstreamError> for AdapterError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::NotFound { resource } => Self::NotFound { resource },
            UpstreamError::PermissionDenied { reason } => Self::PermissionDenied { reason },
            UpstreamError::Throttled { retry_after } => Self::RateLimited { retry_after },
            UpstreamError::Malformed { reason } => Self::Response { reason },
            UpstreamError::Unavailable { reason } => Self::Transport { reason },
        }
    }
}

impl From<AdapterError> for UpstreamError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::NotFound { resource } => Self::NotFound { resource },
            AdapterError::PermissionDenied { reason } => Self::PermissionDenied { reason },
            AdapterError::RateLimited { retry_after } => Self::Throttled { retry_after },
            AdapterError::Response { reason } => Self::Malformed { reason },
            AdapterError::Configuration { reason }
            | AdapterError::InvalidRequest { reason }
            | AdapterError::Transport { reason } => Self::Unavailable { reason },
        }
    }
}

/// Knowledge base the agent may consult during the turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseReference {
    /// Knowledge base identifier.
    pub knowledge_base_id: String,
    /// Model the prompt template targets, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_arn: Option<String>,
}

/// Attributes scoped to a single invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationAttributes {
    /// Knowledge bases available to the agent.
    pub knowledge_base_configurations: Vec<KnowledgeBaseReference>,
    /// Passages retrieved ahead of the call.
    pub retrieved_references: Vec<RetrievedPassage>,
}

/// Session state sent with every invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Per-invocation attributes.
    pub invocation_attributes: InvocationAttributes,
}

/// Request opening a streaming agent invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeAgentRequest {
    /// Agent identifier.
    pub agent_id: String,
    /// Agent alias identifier.
    pub agent_alias_id: String,
    /// Conversation used as the remote session.
    pub session_id: ConversationId,
    /// Always false; sessions stay open across turns.
    pub end_session: bool,
    /// Raw user text.
    pub input_text: String,
    /// Retrieval context.
    pub session_state: SessionState,
    /// Guardrail attached to the invocation.
    #[serde(flatten)]
    pub guardrail: GuardrailParameters,
}

impl InvokeAgentRequest {
    /// Checks the fields the service requires before a request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidRequest`] when the agent, alias or input
    /// text is blank.
    pub fn validate(&self) -> AdapterResult<()> {
        if self.agent_id.trim().is_empty() || self.agent_alias_id.trim().is_empty() {
            return Err(AdapterError::invalid_request("agent and alias ids are required"));
        }
        if self.input_text.trim().is_empty() {
            return Err(AdapterError::invalid_request("input text is empty"));
        }
        Ok(())
    }
}

/// Request registering bootstrapped tools with the remote agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterToolsRequest {
    /// Agent identifier.
    pub agent_id: String,
    /// Agent alias identifier.
    pub agent_alias_id: String,
    /// Role the agent assumes when calling tools.
    pub execution_role_arn: String,
    /// Tool descriptors.
    pub tools: Vec<ToolDescriptor>,
}

impl RegisterToolsRequest {
    /// Builds a registration request for `identity`.
    #[must_use]
    pub fn new(identity: &AgentIdentity, tools: &[ToolDescriptor]) -> Self {
        Self {
            agent_id: identity.agent_id().to_owned(),
            agent_alias_id: identity.alias_id().to_owned(),
            execution_role_arn: identity.execution_role_ref().to_owned(),
            tools: tools.to_vec(),
        }
    }
}

/// One event streamed by the remote agent.
///
/// Events are kept as raw JSON; accessors read the fields the gateway cares
/// about and everything else is left for trace inspection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentEvent {
    raw: Value,
}

impl AgentEvent {
    /// Wraps a raw event payload.
    #[must_use]
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// Raw payload.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Text chunk at `delta.text`, if present and non-empty.
    #[must_use]
    pub fn text_delta(&self) -> Option<&str> {
        self.raw
            .get("delta")
            .and_then(|delta| delta.get("text"))
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    }

    /// Token count at `metrics.outputTokens`. Missing, negative and
    /// non-integer values count as zero.
    #[must_use]
    pub fn output_tokens(&self) -> u64 {
        self.raw
            .get("metrics")
            .and_then(|metrics| metrics.get("outputTokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    /// Trace record, if the event carries one.
    #[must_use]
    pub fn trace(&self) -> Option<&Value> {
        self.raw.get("trace").filter(|trace| !trace.is_null())
    }
}

/// Remote agent service contract.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Registers bootstrapped tool adapters with the agent.
    async fn register_tools(
        &self,
        identity: &AgentIdentity,
        tools: &[ToolDescriptor],
    ) -> AdapterResult<()>;

    /// Opens a streaming invocation. Events arrive in emission order and the
    /// stream ends when the agent finishes the turn.
    async fn invoke(&self, request: InvokeAgentRequest) -> AdapterResult<AgentEventStream>;
}
