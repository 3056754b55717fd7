//! Safety verdicts derived from guardrail responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contracts::ApplyGuardrailResponse;

const INTERVENED_SENTINELS: [&str; 2] = ["INTERVENED", "GUARDRAIL_INTERVENED"];

/// Normalized guardrail action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailAction {
    /// Content passed unchanged.
    None,
    /// The guardrail blocked or rewrote the content.
    Intervened,
}

impl GuardrailAction {
    /// Maps a service action string. Anything other than an intervened
    /// sentinel (compared case-insensitively) counts as no action.
    #[must_use]
    pub fn from_wire(action: &str) -> Self {
        let action = action.trim();
        if INTERVENED_SENTINELS
            .iter()
            .any(|sentinel| sentinel.eq_ignore_ascii_case(action))
        {
            Self::Intervened
        } else {
            Self::None
        }
    }
}

/// Extra detail reported alongside a verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerdictMetadata {
    /// Coverage statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<Value>,
    /// Per-policy assessments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessments: Option<Value>,
}

/// Outcome of screening tool-sourced output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    action: GuardrailAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    replacement_text: Option<String>,
    #[serde(default)]
    metadata: VerdictMetadata,
}

impl SafetyVerdict {
    /// Normalized action.
    #[must_use]
    pub fn action(&self) -> GuardrailAction {
        self.action
    }

    /// Returns true when the guardrail intervened.
    #[must_use]
    pub fn intervened(&self) -> bool {
        self.action == GuardrailAction::Intervened
    }

    /// Service-provided reason.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Trimmed, non-empty replacement text.
    #[must_use]
    pub fn replacement_text(&self) -> Option<&str> {
        self.replacement_text.as_deref()
    }

    /// Coverage and assessment detail.
    #[must_use]
    pub fn metadata(&self) -> &VerdictMetadata {
        &self.metadata
    }

    /// Text to show in place of `original`: the replacement when one exists,
    /// otherwise the original unchanged.
    #[must_use]
    pub fn resolved_text<'a>(&'a self, original: &'a str) -> &'a str {
        self.replacement_text().unwrap_or(original)
    }
}

impl From<ApplyGuardrailResponse> for SafetyVerdict {
    fn from(response: ApplyGuardrailResponse) -> Self {
        let joined = response
            .outputs
            .iter()
            .filter_map(|output| output.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            action: GuardrailAction::from_wire(&response.action),
            reason: response.action_reason,
            replacement_text: normalize_replacement(Some(&joined)),
            metadata: VerdictMetadata {
                coverage: response.guardrail_coverage,
                assessments: response.assessments,
            },
        }
    }
}

fn normalize_replacement(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}
