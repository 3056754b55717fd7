//! Retrieved passages and their citation projection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Title used when a passage carries no document title.
pub const DEFAULT_CITATION_TITLE: &str = "Document";

/// Opaque record returned by the knowledge store.
///
/// The gateway only reads the document title and source locator; the rest of
/// the record is forwarded untouched to the remote agent as a retrieved
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetrievedPassage(Value);

impl RetrievedPassage {
    /// Wraps a raw store record.
    #[must_use]
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// Returns the raw record.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// Document title at `content.document.title`.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.document_field("title")
    }

    /// Source locator at `content.document.sourceUri`, falling back to `s3Uri`.
    #[must_use]
    pub fn source_locator(&self) -> Option<&str> {
        self.document_field("sourceUri")
            .or_else(|| self.document_field("s3Uri"))
    }

    /// Renders the passage as `"{title} ({locator})"`.
    #[must_use]
    pub fn citation(&self) -> String {
        format!(
            "{} ({})",
            self.title().unwrap_or(DEFAULT_CITATION_TITLE),
            self.source_locator().unwrap_or_default()
        )
    }

    fn document_field(&self, key: &str) -> Option<&str> {
        self.0
            .get("content")?
            .get("document")?
            .get(key)?
            .as_str()
    }
}

impl From<Value> for RetrievedPassage {
    fn from(raw: Value) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_title_and_source_uri() {
        let passage = RetrievedPassage::new(json!({
            "content": {"document": {"title": "Runbook", "sourceUri": "s3://bucket/key"}}
        }));
        assert_eq!(passage.citation(), "Runbook (s3://bucket/key)");
    }

    #[test]
    fn falls_back_to_s3_uri() {
        let passage = RetrievedPassage::new(json!({
            "content": {"document": {"title": "Runbook", "s3Uri": "s3://bucket/other"}}
        }));
        assert_eq!(passage.source_locator(), Some("s3://bucket/other"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let passage = RetrievedPassage::new(json!({"score": 0.4}));
        assert_eq!(passage.citation(), "Document ()");
    }

    #[test]
    fn non_string_title_is_ignored() {
        let passage = RetrievedPassage::new(json!({
            "content": {"document": {"title": 7, "sourceUri": "https://docs"}}
        }));
        assert_eq!(passage.citation(), "Document (https://docs)");
    }
}
