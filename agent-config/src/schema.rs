//! Strongly typed configuration schemas.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use agent_policy::GuardrailConfig;
use agent_primitives::AgentIdentity;
use agent_prompts::PromptTemplateConfig;
use agent_retrieval::KnowledgeBaseConfig;
use agent_telemetry::DEFAULT_QUEUE_CAPACITY;
use agent_tools::{DEFAULT_INSTALL_DIR, ToolRepositoryConfig};

/// Default telemetry namespace.
pub const DEFAULT_NAMESPACE: &str = "AgentCore/Gateway";

/// Default per-request timeout for remote services.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default bound on concurrently scheduled turns.
pub const DEFAULT_MAX_CONCURRENT_TURNS: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(value) => value,
    None => unreachable!(),
};

/// Connection settings for the remote services.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Base URL shared by every service endpoint.
    pub endpoint: String,
    /// Bearer token, if the services require one.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Tool adapter installation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolsConfig {
    /// Directory checkouts are installed into.
    pub install_dir: PathBuf,
    /// Repositories to install.
    pub repositories: Vec<ToolRepositoryConfig>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from(DEFAULT_INSTALL_DIR),
            repositories: Vec::new(),
        }
    }
}

/// Metric and feedback settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Namespace metrics are published under.
    pub namespace: String,
    /// Publish metrics to the remote monitoring service.
    pub metrics_enabled: bool,
    /// Local NDJSON feedback file.
    pub feedback_path: Option<PathBuf>,
    /// Send feedback to the remote monitoring service.
    pub remote_feedback: bool,
    /// Telemetry queue bound.
    pub queue_capacity: NonZeroUsize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            metrics_enabled: true,
            feedback_path: None,
            remote_feedback: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Remote agent identity.
    pub identity: AgentIdentity,
    /// Knowledge base queried before every turn.
    pub knowledge_base: KnowledgeBaseConfig,
    /// Prompt template resolved once per instance.
    pub prompt: PromptTemplateConfig,
    /// Guardrail attached to invocations.
    pub guardrail: GuardrailConfig,
    /// Remote service connection.
    pub service: ServiceConfig,
    /// Tool adapters to bootstrap.
    pub tools: ToolsConfig,
    /// Metrics and feedback.
    pub observability: ObservabilityConfig,
    /// Bound on concurrently scheduled turns.
    pub max_concurrent_turns: NonZeroUsize,
}
