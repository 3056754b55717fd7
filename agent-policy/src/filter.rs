//! Safety filter backed by a remote guardrail service.

use std::sync::Arc;

use agent_primitives::UpstreamResult;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::contracts::{
    ApplyGuardrailRequest, ApplyGuardrailResponse, GuardrailConfig, GuardrailParameters,
};
use crate::decision::SafetyVerdict;
use crate::error::GuardrailResult;

/// Trait implemented by remote guardrail backends.
#[async_trait]
pub trait GuardrailClient: Send + Sync {
    /// Screens the supplied content and returns the service verdict.
    async fn apply_guardrail(
        &self,
        request: &ApplyGuardrailRequest,
    ) -> UpstreamResult<ApplyGuardrailResponse>;
}

/// Wraps the guardrail service for agent invocations and output re-screens.
#[derive(Clone)]
pub struct SafetyFilter {
    config: GuardrailConfig,
    client: Arc<dyn GuardrailClient>,
}

impl std::fmt::Debug for SafetyFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyFilter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SafetyFilter {
    /// Creates a filter for the configured guardrail.
    #[must_use]
    pub fn new(config: GuardrailConfig, client: Arc<dyn GuardrailClient>) -> Self {
        Self { config, client }
    }

    /// Guardrail configuration.
    #[must_use]
    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Parameters attached to every agent invocation.
    #[must_use]
    pub fn runtime_parameters(&self) -> GuardrailParameters {
        GuardrailParameters {
            guardrail_identifier: self.config.identifier().to_owned(),
            guardrail_version: self.config.version().map(str::to_owned),
        }
    }

    /// Re-screens agent output, typically output that came from a tool.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GuardrailError::Upstream`] when the service call fails.
    pub async fn apply_to_output(&self, text: &str) -> GuardrailResult<SafetyVerdict> {
        let request = ApplyGuardrailRequest::for_output(&self.config, text);
        let response = self.client.apply_guardrail(&request).await?;
        let verdict = SafetyVerdict::from(response);

        if verdict.intervened() {
            info!(
                guardrail = self.config.identifier(),
                reason = verdict.reason().unwrap_or_default(),
                replaced = verdict.replacement_text().is_some(),
                "guardrail intervened on output"
            );
        } else {
            debug!(guardrail = self.config.identifier(), "output passed guardrail");
        }
        Ok(verdict)
    }
}
