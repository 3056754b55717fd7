use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use agent_adapters::{
    AdapterError, AdapterResult, AgentEvent, AgentEventStream, AgentRuntime, InvokeAgentRequest,
};
use agent_kernel::{AgentGateway, AgentGatewayBuilder, GatewayError, SchedulerError};
use agent_policy::{
    ApplyGuardrailRequest, ApplyGuardrailResponse, GuardrailClient, GuardrailConfig, SafetyFilter,
};
use agent_primitives::{AgentIdentity, ConversationId, UpstreamResult};
use agent_prompts::{
    GetPromptRequest, GetPromptResponse, PromptLibrary, PromptTemplateConfig, TemplateCache,
};
use agent_retrieval::{
    ContextRetriever, KnowledgeBaseConfig, KnowledgeStore, RetrieveRequest, RetrievedPassage,
};
use agent_telemetry::{FeedbackRating, FileFeedbackStore, Telemetry, TelemetryError};
use agent_tools::{
    BootstrapError, Bootstrapper, DEFAULT_MANIFEST_FILE, SourceFetcher, ToolDescriptor,
    ToolRepositoryConfig, ToolResult,
};
use async_trait::async_trait;
use futures::stream;
use serde_json::json;
use uuid::Uuid;

struct Library;

#[async_trait]
impl PromptLibrary for Library {
    async fn get_prompt(&self, _: &GetPromptRequest) -> UpstreamResult<GetPromptResponse> {
        Ok(GetPromptResponse {
            name: "ops".into(),
            prompt: Some("Answer operations questions.".into()),
            ..GetPromptResponse::default()
        })
    }
}

struct EmptyStore;

#[async_trait]
impl KnowledgeStore for EmptyStore {
    async fn retrieve(&self, _: &RetrieveRequest) -> UpstreamResult<Vec<RetrievedPassage>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct CountingGuard {
    calls: Mutex<usize>,
}

#[async_trait]
impl GuardrailClient for CountingGuard {
    async fn apply_guardrail(
        &self,
        _: &ApplyGuardrailRequest,
    ) -> UpstreamResult<ApplyGuardrailResponse> {
        *self.calls.lock().unwrap() += 1;
        Ok(ApplyGuardrailResponse {
            action: "NONE".into(),
            ..ApplyGuardrailResponse::default()
        })
    }
}

#[derive(Default)]
struct RecordingRuntime {
    registered: Mutex<Vec<Vec<ToolDescriptor>>>,
    reject_registration: bool,
}

#[async_trait]
impl AgentRuntime for RecordingRuntime {
    async fn register_tools(
        &self,
        _: &AgentIdentity,
        tools: &[ToolDescriptor],
    ) -> AdapterResult<()> {
        if self.reject_registration {
            return Err(AdapterError::PermissionDenied {
                reason: "role cannot register tools".into(),
            });
        }
        self.registered.lock().unwrap().push(tools.to_vec());
        Ok(())
    }

    async fn invoke(&self, request: InvokeAgentRequest) -> AdapterResult<AgentEventStream> {
        // Mentions the tool by name without emitting a trace.
        let text = if request.input_text.contains("ticket") {
            "Opened via ticket-bot."
        } else {
            "All systems nominal."
        };
        Ok(Box::pin(stream::iter(vec![Ok(AgentEvent::new(
            json!({"delta": {"text": text}}),
        ))])))
    }
}

struct ManifestFetcher;

impl SourceFetcher for ManifestFetcher {
    fn fetch(&self, _: &ToolRepositoryConfig, destination: &Path) -> ToolResult<()> {
        std::fs::create_dir_all(destination).unwrap();
        std::fs::write(destination.join(DEFAULT_MANIFEST_FILE), b"{}").unwrap();
        Ok(())
    }

    fn setup(&self, _: &ToolRepositoryConfig, _: &[String], _: &Path) -> ToolResult<()> {
        Ok(())
    }
}

struct BrokenFetcher;

impl SourceFetcher for BrokenFetcher {
    fn fetch(&self, repository: &ToolRepositoryConfig, _: &Path) -> ToolResult<()> {
        Err(BootstrapError::Fetch {
            name: repository.name().to_owned(),
            reason: "repository not found".into(),
        })
    }

    fn setup(&self, _: &ToolRepositoryConfig, _: &[String], _: &Path) -> ToolResult<()> {
        Ok(())
    }
}

fn temp_path(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()))
}

fn bootstrapper(fetcher: Arc<dyn SourceFetcher>) -> Bootstrapper {
    Bootstrapper::new(
        temp_path("gateway-tools"),
        vec![ToolRepositoryConfig::new(
            "ticket-bot",
            "https://example.com/ticket-bot.git",
        )],
    )
    .with_fetcher(fetcher)
}

fn builder(runtime: Arc<RecordingRuntime>, guard: Arc<CountingGuard>) -> AgentGatewayBuilder {
    AgentGateway::builder()
        .identity(
            AgentIdentity::builder()
                .agent_id("agent-1")
                .alias_id("alias-1")
                .execution_role_ref("role/exec")
                .build()
                .unwrap(),
        )
        .templates(TemplateCache::new(
            PromptTemplateConfig::new("prompt-1").unwrap(),
            Arc::new(Library),
        ))
        .retriever(ContextRetriever::new(
            KnowledgeBaseConfig::new("kb-1"),
            Arc::new(EmptyStore),
        ))
        .safety_filter(SafetyFilter::new(GuardrailConfig::new("guard-1").unwrap(), guard))
        .runtime(runtime)
}

#[tokio::test]
async fn bootstraps_and_registers_tools_once() {
    let runtime = Arc::new(RecordingRuntime::default());
    let gateway = builder(runtime.clone(), Arc::default())
        .bootstrapper(bootstrapper(Arc::new(ManifestFetcher)))
        .build()
        .await
        .unwrap();

    assert_eq!(gateway.tools().len(), 1);
    assert_eq!(gateway.tools()[0].name(), "ticket-bot");
    let registered = runtime.registered.lock().unwrap();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0], gateway.tools());
}

#[tokio::test]
async fn tool_names_count_as_provenance_keywords() {
    let guard = Arc::new(CountingGuard::default());
    let gateway = builder(Arc::default(), guard.clone())
        .bootstrapper(bootstrapper(Arc::new(ManifestFetcher)))
        .build()
        .await
        .unwrap();
    let conversation = ConversationId::new("conv-1").unwrap();

    let plain = gateway.respond(&conversation, "status?").await.unwrap();
    assert!(!plain.provenance().is_tool_sourced());

    let tooled = gateway.respond(&conversation, "open a ticket").await.unwrap();
    assert!(tooled.provenance().is_tool_sourced());
    assert_eq!(*guard.calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn bootstrap_failure_aborts_construction() {
    let runtime = Arc::new(RecordingRuntime::default());
    let err = builder(runtime.clone(), Arc::default())
        .bootstrapper(bootstrapper(Arc::new(BrokenFetcher)))
        .build()
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Bootstrap(BootstrapError::Fetch { .. })));
    assert!(runtime.registered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn registration_failure_aborts_construction() {
    let runtime = Arc::new(RecordingRuntime {
        reject_registration: true,
        ..RecordingRuntime::default()
    });
    let err = builder(runtime, Arc::default()).build().await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Registration(AdapterError::PermissionDenied { .. })
    ));
}

#[tokio::test]
async fn missing_component_is_reported() {
    let err = AgentGateway::builder().build().await.unwrap_err();
    assert!(matches!(err, GatewayError::MissingComponent("identity")));
}

#[tokio::test]
async fn scheduled_turns_complete_until_closed() {
    let gateway = builder(Arc::default(), Arc::default()).build().await.unwrap();

    let handle = gateway
        .schedule(ConversationId::random(), "status?")
        .unwrap();
    let result = handle.await.unwrap().unwrap().unwrap();
    assert_eq!(result.final_text(), "All systems nominal.");

    gateway.close().await;
    let rejected = gateway.schedule(ConversationId::random(), "again");
    assert_eq!(rejected.unwrap_err(), SchedulerError::Closed);
}

#[tokio::test]
async fn feedback_requires_a_store() {
    let gateway = builder(Arc::default(), Arc::default()).build().await.unwrap();
    let err = gateway
        .record_feedback(ConversationId::random(), FeedbackRating::Positive, "")
        .await
        .unwrap_err();
    assert!(matches!(err, TelemetryError::FeedbackDisabled));
}

#[tokio::test]
async fn feedback_is_written_to_the_store() {
    let path = temp_path("gateway-feedback").with_extension("ndjson");
    let store = Arc::new(FileFeedbackStore::open(path.clone()).await.unwrap());
    let telemetry = Telemetry::builder().with_feedback_store(store.clone()).spawn();
    let gateway = builder(Arc::default(), Arc::default())
        .telemetry(telemetry)
        .build()
        .await
        .unwrap();

    let conversation = ConversationId::new("conv-9").unwrap();
    gateway
        .record_feedback(conversation.clone(), FeedbackRating::Negative, "wrong runbook")
        .await
        .unwrap();

    let records = store.records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].conversation_id(), &conversation);
    assert_eq!(records[0].notes(), "wrong runbook");
    let _ = std::fs::remove_file(path);
}
