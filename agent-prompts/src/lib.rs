//! Prompt template resolution for the agent gateway.
//!
//! The gateway resolves one template from a remote prompt library and keeps it
//! for the lifetime of the service instance; see [`TemplateCache`].

#![warn(missing_docs, clippy::pedantic)]

pub mod cache;
pub mod error;
pub mod library;
pub mod template;

pub use cache::TemplateCache;
pub use error::{PromptError, PromptResult};
pub use library::PromptLibrary;
pub use template::{
    GetPromptRequest, GetPromptResponse, LATEST_VERSION_MARKER, PromptTemplate,
    PromptTemplateConfig, PromptVersion, TextTemplate,
};
