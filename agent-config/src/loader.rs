//! Loads [`GatewayConfig`] from environment-style key/value lookups.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use agent_policy::GuardrailConfig;
use agent_primitives::AgentIdentity;
use agent_prompts::PromptTemplateConfig;
use agent_retrieval::KnowledgeBaseConfig;
use agent_tools::ToolRepositoryConfig;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::schema::{
    DEFAULT_MAX_CONCURRENT_TURNS, DEFAULT_TIMEOUT, GatewayConfig, ObservabilityConfig,
    ServiceConfig, ToolsConfig,
};

/// Environment keys read by the loader.
pub mod keys {
    #![allow(missing_docs)]

    pub const AGENT_ID: &str = "AGENT_ID";
    pub const AGENT_ALIAS_ID: &str = "AGENT_ALIAS_ID";
    pub const AGENT_EXECUTION_ROLE: &str = "AGENT_EXECUTION_ROLE";
    pub const KNOWLEDGE_BASE_ID: &str = "KNOWLEDGE_BASE_ID";
    pub const KNOWLEDGE_BASE_TOP_K: &str = "KNOWLEDGE_BASE_TOP_K";
    pub const KNOWLEDGE_BASE_FILTER: &str = "KNOWLEDGE_BASE_FILTER";
    pub const PROMPT_ID: &str = "PROMPT_ID";
    pub const PROMPT_VERSION: &str = "PROMPT_VERSION";
    pub const GUARDRAIL_ID: &str = "GUARDRAIL_ID";
    pub const GUARDRAIL_VERSION: &str = "GUARDRAIL_VERSION";
    pub const AGENTCORE_ENDPOINT: &str = "AGENTCORE_ENDPOINT";
    pub const AGENTCORE_API_KEY: &str = "AGENTCORE_API_KEY";
    pub const AGENTCORE_TIMEOUT_SECS: &str = "AGENTCORE_TIMEOUT_SECS";
    pub const TOOL_INSTALL_DIR: &str = "TOOL_INSTALL_DIR";
    pub const TOOL_REPOSITORIES: &str = "TOOL_REPOSITORIES";
    pub const OBS_NAMESPACE: &str = "OBS_NAMESPACE";
    pub const OBS_METRICS_ENABLED: &str = "OBS_METRICS_ENABLED";
    pub const OBS_FEEDBACK_PATH: &str = "OBS_FEEDBACK_PATH";
    pub const OBS_REMOTE_FEEDBACK: &str = "OBS_REMOTE_FEEDBACK";
    pub const OBS_QUEUE_CAPACITY: &str = "OBS_QUEUE_CAPACITY";
    pub const GATEWAY_MAX_CONCURRENT_TURNS: &str = "GATEWAY_MAX_CONCURRENT_TURNS";
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required key was absent or blank.
    #[error("missing required configuration `{key}`")]
    Missing {
        /// Offending key.
        key: &'static str,
    },

    /// A key was present but its value could not be used.
    #[error("invalid configuration `{key}`: {reason}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl ToString) -> Self {
        Self::Invalid {
            key,
            reason: reason.to_string(),
        }
    }
}

struct Source<F> {
    lookup: F,
}

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed, non-empty value for `key`.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &'static str) -> ConfigResult<String> {
        self.optional(key).ok_or(ConfigError::Missing { key })
    }

    fn parsed<T>(&self, key: &'static str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|value| value.parse::<T>().map_err(|err| ConfigError::invalid(key, err)))
            .transpose()
    }

    fn flag(&self, key: &'static str, default: bool) -> ConfigResult<bool> {
        let Some(value) = self.optional(key) else {
            return Ok(default);
        };
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(key, format!("`{value}` is not a boolean"))),
        }
    }

    fn json<T>(&self, key: &'static str) -> ConfigResult<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        self.optional(key)
            .map(|value| serde_json::from_str(&value).map_err(|err| ConfigError::invalid(key, err)))
            .transpose()
    }
}

impl GatewayConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`GatewayConfig::from_lookup`].
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] for absent required keys and
    /// [`ConfigError::Invalid`] for values that fail to parse or validate.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Source { lookup };

        let identity = load_identity(&source)?;

        let mut knowledge_base = KnowledgeBaseConfig::new(source.required(keys::KNOWLEDGE_BASE_ID)?);
        if let Some(top_k) = source.parsed::<NonZeroUsize>(keys::KNOWLEDGE_BASE_TOP_K)? {
            knowledge_base = knowledge_base.with_top_k(top_k);
        }
        if let Some(filter) = source.json::<Value>(keys::KNOWLEDGE_BASE_FILTER)? {
            if !filter.is_object() {
                return Err(ConfigError::invalid(
                    keys::KNOWLEDGE_BASE_FILTER,
                    "filter must be a JSON object",
                ));
            }
            knowledge_base = knowledge_base.with_filter(filter);
        }

        let mut prompt = PromptTemplateConfig::new(source.required(keys::PROMPT_ID)?)
            .map_err(|err| ConfigError::invalid(keys::PROMPT_ID, err))?;
        if let Some(version) = source.optional(keys::PROMPT_VERSION) {
            prompt = prompt.with_version(version);
        }

        let mut guardrail = GuardrailConfig::new(source.required(keys::GUARDRAIL_ID)?)
            .map_err(|err| ConfigError::invalid(keys::GUARDRAIL_ID, err))?;
        if let Some(version) = source.optional(keys::GUARDRAIL_VERSION) {
            guardrail = guardrail.with_version(version);
        }

        let service = load_service(&source)?;
        let tools = load_tools(&source)?;
        let observability = load_observability(&source)?;
        let max_concurrent_turns = source
            .parsed::<NonZeroUsize>(keys::GATEWAY_MAX_CONCURRENT_TURNS)?
            .unwrap_or(DEFAULT_MAX_CONCURRENT_TURNS);

        let config = Self {
            identity,
            knowledge_base,
            prompt,
            guardrail,
            service,
            tools,
            observability,
            max_concurrent_turns,
        };
        debug!(?config, "gateway configuration loaded");
        Ok(config)
    }
}

fn load_identity<F>(source: &Source<F>) -> ConfigResult<AgentIdentity>
where
    F: Fn(&str) -> Option<String>,
{
    AgentIdentity::builder()
        .agent_id(source.required(keys::AGENT_ID)?)
        .alias_id(source.required(keys::AGENT_ALIAS_ID)?)
        .execution_role_ref(source.required(keys::AGENT_EXECUTION_ROLE)?)
        .build()
        .map_err(|err| ConfigError::invalid(keys::AGENT_ID, err))
}

fn load_service<F>(source: &Source<F>) -> ConfigResult<ServiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let endpoint = source.required(keys::AGENTCORE_ENDPOINT)?;
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(ConfigError::invalid(
            keys::AGENTCORE_ENDPOINT,
            "endpoint must start with http:// or https://",
        ));
    }

    let timeout = match source.parsed::<u64>(keys::AGENTCORE_TIMEOUT_SECS)? {
        Some(0) => {
            return Err(ConfigError::invalid(
                keys::AGENTCORE_TIMEOUT_SECS,
                "timeout must be at least one second",
            ));
        }
        Some(secs) => Duration::from_secs(secs),
        None => DEFAULT_TIMEOUT,
    };

    Ok(ServiceConfig {
        endpoint,
        api_key: source.optional(keys::AGENTCORE_API_KEY),
        timeout,
    })
}

fn load_tools<F>(source: &Source<F>) -> ConfigResult<ToolsConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut tools = ToolsConfig::default();
    if let Some(dir) = source.optional(keys::TOOL_INSTALL_DIR) {
        tools.install_dir = PathBuf::from(dir);
    }
    if let Some(repositories) = source.json::<Vec<ToolRepositoryConfig>>(keys::TOOL_REPOSITORIES)? {
        for repository in &repositories {
            repository
                .validate()
                .map_err(|err| ConfigError::invalid(keys::TOOL_REPOSITORIES, err))?;
        }
        tools.repositories = repositories;
    }
    Ok(tools)
}

fn load_observability<F>(source: &Source<F>) -> ConfigResult<ObservabilityConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = ObservabilityConfig::default();
    Ok(ObservabilityConfig {
        namespace: source
            .optional(keys::OBS_NAMESPACE)
            .unwrap_or(defaults.namespace),
        metrics_enabled: source.flag(keys::OBS_METRICS_ENABLED, defaults.metrics_enabled)?,
        feedback_path: source.optional(keys::OBS_FEEDBACK_PATH).map(PathBuf::from),
        remote_feedback: source.flag(keys::OBS_REMOTE_FEEDBACK, defaults.remote_feedback)?,
        queue_capacity: source
            .parsed::<NonZeroUsize>(keys::OBS_QUEUE_CAPACITY)?
            .unwrap_or(defaults.queue_capacity),
    })
}
