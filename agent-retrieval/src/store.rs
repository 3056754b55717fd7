//! Knowledge store client contract and request shapes.

use std::num::NonZeroUsize;

use agent_primitives::UpstreamResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::passage::RetrievedPassage;

/// Search type requested from the store.
pub const SEMANTIC_SEARCH: &str = "SEMANTIC";

/// Result cap applied when no explicit value is configured.
pub const DEFAULT_TOP_K: NonZeroUsize = match NonZeroUsize::new(5) {
    Some(value) => value,
    None => unreachable!(),
};

/// Identifies the knowledge base and its query shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    knowledge_base_id: String,
    top_k: NonZeroUsize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

impl KnowledgeBaseConfig {
    /// Creates a configuration with the default result cap and no filter.
    #[must_use]
    pub fn new(knowledge_base_id: impl Into<String>) -> Self {
        Self {
            knowledge_base_id: knowledge_base_id.into(),
            top_k: DEFAULT_TOP_K,
            filter: None,
        }
    }

    /// Overrides the result cap.
    #[must_use]
    pub fn with_top_k(mut self, top_k: NonZeroUsize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Attaches a store-side filter expression.
    #[must_use]
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Returns the knowledge base identifier.
    #[must_use]
    pub fn knowledge_base_id(&self) -> &str {
        &self.knowledge_base_id
    }

    /// Returns the result cap.
    #[must_use]
    pub fn top_k(&self) -> NonZeroUsize {
        self.top_k
    }

    /// Returns the filter expression, if any.
    #[must_use]
    pub fn filter(&self) -> Option<&Value> {
        self.filter.as_ref()
    }

    /// Builds the store request for `query`.
    #[must_use]
    pub fn request(&self, query: &str) -> RetrieveRequest {
        RetrieveRequest {
            knowledge_base_id: self.knowledge_base_id.clone(),
            retrieval_query: RetrievalQuery {
                text: query.to_owned(),
            },
            retrieval_configuration: RetrievalConfiguration {
                vector_search_configuration: VectorSearchConfiguration {
                    number_of_results: self.top_k.get(),
                    override_search_type: SEMANTIC_SEARCH.to_owned(),
                },
            },
            filter: self.filter.clone(),
        }
    }
}

/// Retrieval request sent to the knowledge store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveRequest {
    /// Knowledge base to search.
    pub knowledge_base_id: String,
    /// Query text.
    pub retrieval_query: RetrievalQuery,
    /// Vector search parameters.
    pub retrieval_configuration: RetrievalConfiguration,
    /// Optional filter expression forwarded as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

/// Query text wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalQuery {
    /// Raw user text.
    pub text: String,
}

/// Retrieval configuration wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfiguration {
    /// Vector search settings.
    pub vector_search_configuration: VectorSearchConfiguration,
}

/// Vector search settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchConfiguration {
    /// Result cap.
    pub number_of_results: usize,
    /// Search type, always [`SEMANTIC_SEARCH`].
    pub override_search_type: String,
}

/// Response returned by the knowledge store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveResponse {
    /// Results in store order.
    pub retrieved_results: Vec<RetrievedPassage>,
}

/// Trait implemented by knowledge store backends.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Runs a retrieval request, returning passages in store order.
    async fn retrieve(&self, request: &RetrieveRequest) -> UpstreamResult<Vec<RetrievedPassage>>;
}
