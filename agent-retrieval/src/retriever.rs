//! Context retriever combining a knowledge store with citation rendering.

use std::sync::Arc;

use tracing::debug;

use crate::error::{RetrievalError, RetrievalResult};
use crate::passage::RetrievedPassage;
use crate::store::{KnowledgeBaseConfig, KnowledgeStore};

/// Queries the configured knowledge base for passages relevant to a turn.
#[derive(Clone)]
pub struct ContextRetriever {
    config: KnowledgeBaseConfig,
    store: Arc<dyn KnowledgeStore>,
}

impl std::fmt::Debug for ContextRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRetriever")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ContextRetriever {
    /// Creates a retriever for the given knowledge base.
    #[must_use]
    pub fn new(config: KnowledgeBaseConfig, store: Arc<dyn KnowledgeStore>) -> Self {
        Self { config, store }
    }

    /// Returns the knowledge base configuration.
    #[must_use]
    pub fn config(&self) -> &KnowledgeBaseConfig {
        &self.config
    }

    /// Runs a semantic search capped at the configured top-K.
    ///
    /// Results come back in store order. An empty result set is a valid
    /// answer; a failed call is not replaced by one.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::EmptyQuery`] for blank input and
    /// [`RetrievalError::Upstream`] when the store call fails.
    pub async fn retrieve(&self, query: &str) -> RetrievalResult<Vec<RetrievedPassage>> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let request = self.config.request(query);
        let mut passages = self.store.retrieve(&request).await?;
        // Stores occasionally ignore the cap; never forward more than asked for.
        passages.truncate(self.config.top_k().get());

        debug!(
            knowledge_base = self.config.knowledge_base_id(),
            results = passages.len(),
            "knowledge base retrieval complete"
        );
        Ok(passages)
    }

    /// Projects passages into citation strings, preserving order.
    #[must_use]
    pub fn to_citations(passages: &[RetrievedPassage]) -> Vec<String> {
        passages.iter().map(RetrievedPassage::citation).collect()
    }
}
