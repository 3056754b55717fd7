//! Prompt template records and their prompt-library wire shapes.

use std::fmt;

use agent_primitives::UpstreamError;
use serde::{Deserialize, Serialize};

use crate::error::{PromptError, PromptResult};

/// Version marker sent when no explicit version is configured.
pub const LATEST_VERSION_MARKER: &str = "$LATEST";

/// Version selector for a prompt-library entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptVersion {
    /// Pin to an explicit published version.
    Explicit(String),
    /// Follow whatever the library currently marks as latest.
    Latest,
}

impl PromptVersion {
    /// Returns the value sent over the wire.
    #[must_use]
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Explicit(version) => version,
            Self::Latest => LATEST_VERSION_MARKER,
        }
    }
}

impl fmt::Display for PromptVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Identifies which prompt-library entry the cache resolves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplateConfig {
    prompt_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

impl PromptTemplateConfig {
    /// Creates a configuration for the supplied library identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::InvalidConfig`] when the identifier is blank.
    pub fn new(prompt_identifier: impl Into<String>) -> PromptResult<Self> {
        let prompt_identifier = prompt_identifier.into();
        if prompt_identifier.trim().is_empty() {
            return Err(PromptError::InvalidConfig(
                "prompt identifier cannot be empty",
            ));
        }
        Ok(Self {
            prompt_identifier,
            version: None,
        })
    }

    /// Pins the template to an explicit version. Blank values keep the latest marker.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.version = (!version.trim().is_empty()).then_some(version);
        self
    }

    /// Returns the prompt-library identifier.
    #[must_use]
    pub fn prompt_identifier(&self) -> &str {
        &self.prompt_identifier
    }

    /// Returns the version selector.
    #[must_use]
    pub fn version(&self) -> PromptVersion {
        self.version
            .clone()
            .map_or(PromptVersion::Latest, PromptVersion::Explicit)
    }

    /// Builds the library request for this configuration.
    #[must_use]
    pub fn request(&self) -> GetPromptRequest {
        GetPromptRequest {
            prompt_identifier: self.prompt_identifier.clone(),
            prompt_version: self.version().as_wire().to_owned(),
        }
    }
}

/// Prompt template resolved from the library.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    name: String,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_reference: Option<String>,
}

impl PromptTemplate {
    /// Creates a template record.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::EmptyTemplate`] when the text is blank.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> PromptResult<Self> {
        let name = name.into();
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PromptError::EmptyTemplate { name });
        }
        Ok(Self {
            name,
            text,
            model_reference: None,
        })
    }

    /// Attaches the model reference the template was authored for.
    #[must_use]
    pub fn with_model_reference(mut self, model: impl Into<String>) -> Self {
        self.model_reference = Some(model.into());
        self
    }

    /// Template name as reported by the library.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rendered template text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Model the template targets, when the library specifies one.
    #[must_use]
    pub fn model_reference(&self) -> Option<&str> {
        self.model_reference.as_deref()
    }
}

/// Request sent to the prompt library.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPromptRequest {
    /// Library identifier of the prompt.
    pub prompt_identifier: String,
    /// Explicit version or [`LATEST_VERSION_MARKER`].
    pub prompt_version: String,
}

/// Response returned by the prompt library.
///
/// The text arrives either as a flat `prompt` string or nested under
/// `promptTemplate.textTemplate`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPromptResponse {
    /// Template name.
    pub name: String,
    /// Flat template text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Nested template text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<TextTemplate>,
    /// Model the template was authored for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_arn: Option<String>,
}

/// Nested template text shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextTemplate {
    /// Template body.
    pub text_template: String,
}

impl TryFrom<GetPromptResponse> for PromptTemplate {
    type Error = PromptError;

    fn try_from(response: GetPromptResponse) -> Result<Self, Self::Error> {
        let GetPromptResponse {
            name,
            prompt,
            prompt_template,
            model_arn,
        } = response;

        let text = prompt
            .or_else(|| prompt_template.map(|nested| nested.text_template))
            .ok_or_else(|| {
                UpstreamError::malformed(format!(
                    "prompt `{name}` carries neither `prompt` nor `promptTemplate.textTemplate`"
                ))
            })?;

        let template = Self::new(name, text)?;
        Ok(match model_arn {
            Some(model) if !model.trim().is_empty() => template.with_model_reference(model),
            _ => template,
        })
    }
}
