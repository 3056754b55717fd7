//! Client contract for the remote prompt library.

use agent_primitives::UpstreamResult;
use async_trait::async_trait;

use crate::template::{GetPromptRequest, GetPromptResponse};

/// Trait implemented by prompt-library backends.
#[async_trait]
pub trait PromptLibrary: Send + Sync {
    /// Fetches a single prompt definition.
    async fn get_prompt(&self, request: &GetPromptRequest) -> UpstreamResult<GetPromptResponse>;
}
