//! Instance-scoped single-slot cache for the prompt template.

use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::PromptResult;
use crate::library::PromptLibrary;
use crate::template::{PromptTemplate, PromptTemplateConfig};

/// Memoizes the configured prompt template for the lifetime of the owner.
///
/// The first successful fetch is committed and reused forever; there is no
/// TTL and no refresh. Concurrent first callers are serialized on the slot so
/// only one fetch is in flight. A failed or cancelled fetch leaves the slot
/// empty and the next caller retries.
pub struct TemplateCache {
    config: PromptTemplateConfig,
    library: Arc<dyn PromptLibrary>,
    slot: OnceCell<Arc<PromptTemplate>>,
}

impl fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateCache")
            .field("prompt_identifier", &self.config.prompt_identifier())
            .field("version", &self.config.version())
            .field("populated", &self.slot.initialized())
            .finish_non_exhaustive()
    }
}

impl TemplateCache {
    /// Creates an empty cache backed by the supplied library client.
    #[must_use]
    pub fn new(config: PromptTemplateConfig, library: Arc<dyn PromptLibrary>) -> Self {
        Self {
            config,
            library,
            slot: OnceCell::new(),
        }
    }

    /// Returns the cached template, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::PromptError`] from the library call or from
    /// validation of its response. Nothing is cached on error.
    pub async fn fetch(&self) -> PromptResult<Arc<PromptTemplate>> {
        if let Some(template) = self.slot.get() {
            debug!(template = template.name(), "prompt template cache hit");
            return Ok(Arc::clone(template));
        }

        let template = self
            .slot
            .get_or_try_init(|| async {
                let request = self.config.request();
                let response = self.library.get_prompt(&request).await?;
                let template = PromptTemplate::try_from(response)?;
                info!(
                    template = template.name(),
                    prompt_identifier = %request.prompt_identifier,
                    version = %request.prompt_version,
                    "prompt template cached"
                );
                Ok::<_, crate::PromptError>(Arc::new(template))
            })
            .await?;

        Ok(Arc::clone(template))
    }

    /// Returns the committed template without fetching.
    #[must_use]
    pub fn cached(&self) -> Option<Arc<PromptTemplate>> {
        self.slot.get().cloned()
    }

    /// Returns the configuration this cache resolves.
    #[must_use]
    pub fn config(&self) -> &PromptTemplateConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use agent_primitives::{UpstreamError, UpstreamResult};
    use async_trait::async_trait;

    use crate::PromptError;
    use crate::template::{GetPromptRequest, GetPromptResponse};

    struct ScriptedLibrary {
        calls: AtomicUsize,
        responses: Mutex<Vec<UpstreamResult<GetPromptResponse>>>,
    }

    impl ScriptedLibrary {
        fn new(responses: Vec<UpstreamResult<GetPromptResponse>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(responses),
            })
        }
    }

    #[async_trait]
    impl PromptLibrary for ScriptedLibrary {
        async fn get_prompt(
            &self,
            _request: &GetPromptRequest,
        ) -> UpstreamResult<GetPromptResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.responses.lock().expect("responses poisoned").remove(0)
        }
    }

    fn response(text: &str) -> UpstreamResult<GetPromptResponse> {
        Ok(GetPromptResponse {
            name: "ops".into(),
            prompt: Some(text.into()),
            ..GetPromptResponse::default()
        })
    }

    fn config() -> PromptTemplateConfig {
        PromptTemplateConfig::new("prompt/ops").unwrap()
    }

    #[tokio::test]
    async fn second_fetch_reuses_committed_value() {
        let library = ScriptedLibrary::new(vec![response("v1"), response("v2")]);
        let cache = TemplateCache::new(config(), library.clone());

        assert_eq!(cache.fetch().await.unwrap().text(), "v1");
        assert_eq!(cache.fetch().await.unwrap().text(), "v1");
        assert_eq!(library.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_leaves_slot_empty_for_retry() {
        let library = ScriptedLibrary::new(vec![
            Err(UpstreamError::NotFound {
                resource: "prompt/ops".into(),
            }),
            response("recovered"),
        ]);
        let cache = TemplateCache::new(config(), library.clone());

        let err = cache.fetch().await.unwrap_err();
        assert!(matches!(
            err,
            PromptError::Upstream(UpstreamError::NotFound { .. })
        ));
        assert!(cache.cached().is_none());

        assert_eq!(cache.fetch().await.unwrap().text(), "recovered");
        assert_eq!(library.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_first_use_fetches_once() {
        let library = ScriptedLibrary::new(vec![response("only")]);
        let cache = Arc::new(TemplateCache::new(config(), library.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.fetch().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().text(), "only");
        }
        assert_eq!(library.calls.load(Ordering::SeqCst), 1);
    }
}
