//! Guardrail configuration and wire contracts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GuardrailError, GuardrailResult};

/// Version used for explicit re-screens when none is configured.
pub const DRAFT_VERSION: &str = "DRAFT";

/// Content source screened by [`crate::SafetyFilter::apply_to_output`].
pub const OUTPUT_SOURCE: &str = "OUTPUT";

/// Qualifier marking a block as content to be guarded.
pub const GUARD_CONTENT_QUALIFIER: &str = "guard_content";

/// References a guardrail resource in the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

impl GuardrailConfig {
    /// Creates a configuration for the given guardrail identifier.
    ///
    /// # Errors
    ///
    /// Returns [`GuardrailError::InvalidConfig`] when the identifier is blank.
    pub fn new(identifier: impl Into<String>) -> GuardrailResult<Self> {
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return Err(GuardrailError::InvalidConfig(
                "guardrail identifier cannot be empty",
            ));
        }
        Ok(Self {
            identifier,
            version: None,
        })
    }

    /// Pins a guardrail version. Blank values are ignored.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.version = (!version.trim().is_empty()).then_some(version);
        self
    }

    /// Guardrail identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Configured version, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

/// Guardrail fields attached to every agent invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardrailParameters {
    /// Guardrail identifier.
    pub guardrail_identifier: String,
    /// Version, omitted when not configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrail_version: Option<String>,
}

/// Request sent to the guardrail service for an explicit re-screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyGuardrailRequest {
    /// Guardrail identifier.
    pub guardrail_identifier: String,
    /// Guardrail version, [`DRAFT_VERSION`] when none is configured.
    pub guardrail_version: String,
    /// Which side of the exchange the content came from.
    pub source: String,
    /// Content blocks to screen.
    pub content: Vec<GuardrailContentBlock>,
    /// Requested output coverage.
    pub output_scope: String,
}

impl ApplyGuardrailRequest {
    /// Builds an output-screening request for a single text block.
    #[must_use]
    pub fn for_output(config: &GuardrailConfig, text: &str) -> Self {
        Self {
            guardrail_identifier: config.identifier().to_owned(),
            guardrail_version: config.version().unwrap_or(DRAFT_VERSION).to_owned(),
            source: OUTPUT_SOURCE.to_owned(),
            content: vec![GuardrailContentBlock {
                text: GuardrailTextBlock {
                    text: text.to_owned(),
                    qualifiers: vec![GUARD_CONTENT_QUALIFIER.to_owned()],
                },
            }],
            output_scope: "FULL".to_owned(),
        }
    }
}

/// Content block wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailContentBlock {
    /// Text payload.
    pub text: GuardrailTextBlock,
}

/// Text payload of a content block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailTextBlock {
    /// Text to screen.
    pub text: String,
    /// Screening qualifiers.
    #[serde(default)]
    pub qualifiers: Vec<String>,
}

/// Response returned by the guardrail service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyGuardrailResponse {
    /// Action taken, e.g. `NONE` or `GUARDRAIL_INTERVENED`.
    pub action: String,
    /// Service-provided explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_reason: Option<String>,
    /// Adjusted output blocks.
    #[serde(default)]
    pub outputs: Vec<GuardrailOutput>,
    /// Per-policy assessments, forwarded as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessments: Option<Value>,
    /// Coverage statistics, forwarded as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrail_coverage: Option<Value>,
}

/// Adjusted output block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailOutput {
    /// Replacement text, if the service supplied one.
    #[serde(default)]
    pub text: Option<String>,
}
