//! Knowledge-base retrieval for the agent gateway.
//!
//! [`ContextRetriever`] issues a capped semantic search against a
//! [`KnowledgeStore`] and renders the results as citation strings for the
//! front end.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod passage;
pub mod retriever;
pub mod store;

pub use error::{RetrievalError, RetrievalResult};
pub use passage::{DEFAULT_CITATION_TITLE, RetrievedPassage};
pub use retriever::ContextRetriever;
pub use store::{
    DEFAULT_TOP_K, KnowledgeBaseConfig, KnowledgeStore, RetrievalConfiguration, RetrievalQuery,
    RetrieveRequest, RetrieveResponse, SEMANTIC_SEARCH, VectorSearchConfiguration,
};
