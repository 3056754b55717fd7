use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_adapters::{
    AdapterError, AdapterResult, AgentEvent, AgentEventStream, AgentRuntime, InvokeAgentRequest,
};
use agent_kernel::{Provenance, TurnError, TurnPipeline, WITHHELD_MESSAGE};
use agent_policy::{
    ApplyGuardrailRequest, ApplyGuardrailResponse, GuardrailClient, GuardrailConfig,
    GuardrailOutput, SafetyFilter,
};
use agent_primitives::{AgentIdentity, ConversationId, UpstreamError, UpstreamResult};
use agent_prompts::{
    GetPromptRequest, GetPromptResponse, PromptError, PromptLibrary, PromptTemplateConfig,
    TemplateCache,
};
use agent_retrieval::{
    ContextRetriever, KnowledgeBaseConfig, KnowledgeStore, RetrieveRequest, RetrievedPassage,
};
use agent_telemetry::{
    LATENCY_METRIC, Metric, MetricSink, OUTPUT_TOKENS_METRIC, Telemetry, TelemetryError,
    TelemetryResult,
};
use agent_tools::ToolDescriptor;
use async_trait::async_trait;
use futures::stream;
use serde_json::{Value, json};

struct CountingLibrary {
    calls: AtomicUsize,
    fail_first: bool,
}

impl CountingLibrary {
    fn new(fail_first: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first,
        }
    }
}

#[async_trait]
impl PromptLibrary for CountingLibrary {
    async fn get_prompt(&self, _: &GetPromptRequest) -> UpstreamResult<GetPromptResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_first && call == 0 {
            return Err(UpstreamError::NotFound {
                resource: "prompt-1".into(),
            });
        }
        // Later calls return different text; a cached template must not see it.
        Ok(GetPromptResponse {
            name: "support".into(),
            prompt: Some(format!("Template revision {call}")),
            ..GetPromptResponse::default()
        })
    }
}

struct StaticStore(Vec<Value>);

#[async_trait]
impl KnowledgeStore for StaticStore {
    async fn retrieve(&self, _: &RetrieveRequest) -> UpstreamResult<Vec<RetrievedPassage>> {
        Ok(self.0.iter().cloned().map(RetrievedPassage::new).collect())
    }
}

struct ScriptedGuard {
    response: ApplyGuardrailResponse,
    calls: AtomicUsize,
}

impl ScriptedGuard {
    fn new(response: ApplyGuardrailResponse) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    fn passing() -> Self {
        Self::new(ApplyGuardrailResponse {
            action: "NONE".into(),
            ..ApplyGuardrailResponse::default()
        })
    }
}

#[async_trait]
impl GuardrailClient for ScriptedGuard {
    async fn apply_guardrail(
        &self,
        _: &ApplyGuardrailRequest,
    ) -> UpstreamResult<ApplyGuardrailResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Replays `events`, then fails with `PermissionDenied` when `fail_after`
/// is set.
struct ScriptedRuntime {
    events: Vec<Value>,
    fail_after: bool,
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn register_tools(&self, _: &AgentIdentity, _: &[ToolDescriptor]) -> AdapterResult<()> {
        Ok(())
    }

    async fn invoke(&self, _: InvokeAgentRequest) -> AdapterResult<AgentEventStream> {
        let mut events: Vec<AdapterResult<AgentEvent>> =
            self.events.iter().cloned().map(AgentEvent::new).map(Ok).collect();
        if self.fail_after {
            events.push(Err(AdapterError::PermissionDenied {
                reason: "denied".into(),
            }));
        }
        Ok(Box::pin(stream::iter(events)))
    }
}

#[derive(Default)]
struct RecordingSink {
    metrics: Mutex<Vec<Metric>>,
    properties: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MetricSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn put_metric(&self, metric: &Metric) -> TelemetryResult<()> {
        self.metrics.lock().unwrap().push(metric.clone());
        Ok(())
    }

    async fn put_property(&self, name: &str, value: &str) -> TelemetryResult<()> {
        self.properties
            .lock()
            .unwrap()
            .push((name.to_owned(), value.to_owned()));
        Ok(())
    }
}

/// Rejects every call, like a monitoring backend that is down.
struct FailingSink;

#[async_trait]
impl MetricSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn put_metric(&self, _: &Metric) -> TelemetryResult<()> {
        Err(TelemetryError::Upstream(UpstreamError::unavailable("backend down")))
    }

    async fn put_property(&self, _: &str, _: &str) -> TelemetryResult<()> {
        Err(TelemetryError::Upstream(UpstreamError::unavailable("backend down")))
    }
}

/// Never returns from a write.
struct StalledSink;

#[async_trait]
impl MetricSink for StalledSink {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn put_metric(&self, _: &Metric) -> TelemetryResult<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn put_property(&self, _: &str, _: &str) -> TelemetryResult<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

struct Harness {
    library: Arc<CountingLibrary>,
    guard: Arc<ScriptedGuard>,
    pipeline: TurnPipeline,
}

fn identity() -> AgentIdentity {
    AgentIdentity::builder()
        .agent_id("agent-1")
        .alias_id("alias-1")
        .execution_role_ref("role/exec")
        .build()
        .unwrap()
}

fn harness(
    library: CountingLibrary,
    passages: Vec<Value>,
    guard: ScriptedGuard,
    events: Vec<Value>,
) -> Harness {
    build(library, passages, guard, ScriptedRuntime {
        events,
        fail_after: false,
    })
}

fn build(
    library: CountingLibrary,
    passages: Vec<Value>,
    guard: ScriptedGuard,
    runtime: ScriptedRuntime,
) -> Harness {
    let library = Arc::new(library);
    let guard = Arc::new(guard);
    let templates = TemplateCache::new(
        PromptTemplateConfig::new("prompt-1").unwrap(),
        library.clone(),
    );
    let retriever = ContextRetriever::new(
        KnowledgeBaseConfig::new("kb-1"),
        Arc::new(StaticStore(passages)),
    );
    let filter = SafetyFilter::new(GuardrailConfig::new("guard-1").unwrap(), guard.clone());
    let runtime = Arc::new(runtime);
    Harness {
        library,
        guard,
        pipeline: TurnPipeline::new(identity(), templates, retriever, filter, runtime),
    }
}

fn conversation() -> ConversationId {
    ConversationId::new("conv-1").unwrap()
}

fn text(chunk: &str) -> Value {
    json!({"delta": {"text": chunk}})
}

#[tokio::test]
async fn final_text_preserves_chunk_order() {
    let h = harness(
        CountingLibrary::new(false),
        Vec::new(),
        ScriptedGuard::passing(),
        vec![text("The "), text("quick "), text(""), text("brown "), text("fox")],
    );

    let result = h.pipeline.respond(&conversation(), "go").await.unwrap();
    assert_eq!(result.final_text(), "The quick brown fox");
}

#[tokio::test]
async fn output_tokens_ignore_missing_and_negative_counts() {
    let h = harness(
        CountingLibrary::new(false),
        Vec::new(),
        ScriptedGuard::passing(),
        vec![
            json!({"metrics": {"outputTokens": 7}}),
            json!({"metrics": {}}),
            json!({"metrics": {"outputTokens": -4}}),
            json!({"metrics": {"outputTokens": 1.5}}),
            json!({"metrics": {"outputTokens": 3}}),
        ],
    );

    let result = h.pipeline.respond(&conversation(), "go").await.unwrap();
    assert_eq!(result.metrics().output_tokens(), 10);
}

#[tokio::test]
async fn filter_is_never_called_without_tool_provenance() {
    for events in [
        vec![text("plain answer")],
        vec![],
        vec![json!({"trace": {"type": "model_invocation"}}), text("done")],
    ] {
        let h = harness(
            CountingLibrary::new(false),
            Vec::new(),
            ScriptedGuard::passing(),
            events,
        );
        let result = h.pipeline.respond(&conversation(), "go").await.unwrap();
        assert!(result.safety_verdict().is_none());
        assert_eq!(h.guard.calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn empty_tool_output_skips_the_filter() {
    let h = harness(
        CountingLibrary::new(false),
        Vec::new(),
        ScriptedGuard::passing(),
        vec![json!({"trace": {"type": "tool_use"}})],
    );

    let result = h.pipeline.respond(&conversation(), "go").await.unwrap();
    assert!(result.provenance().is_tool_sourced());
    assert_eq!(result.final_text(), "");
    assert!(result.safety_verdict().is_none());
    assert_eq!(h.guard.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn intervention_uses_trimmed_replacement() {
    let h = harness(
        CountingLibrary::new(false),
        Vec::new(),
        ScriptedGuard::new(ApplyGuardrailResponse {
            action: "GUARDRAIL_INTERVENED".into(),
            action_reason: Some("pii".into()),
            outputs: vec![GuardrailOutput {
                text: Some("  [redacted]  ".into()),
            }],
            ..ApplyGuardrailResponse::default()
        }),
        vec![
            json!({"trace": {"type": "action_group"}}),
            text("my card is 4111"),
        ],
    );

    let result = h.pipeline.respond(&conversation(), "go").await.unwrap();
    assert_eq!(result.final_text(), "[redacted]");
    let verdict = result.safety_verdict().unwrap();
    assert!(verdict.intervened());
    assert_eq!(verdict.reason(), Some("pii"));
}

#[tokio::test]
async fn pass_verdict_never_replaces_text() {
    let h = harness(
        CountingLibrary::new(false),
        Vec::new(),
        ScriptedGuard::new(ApplyGuardrailResponse {
            action: "NONE".into(),
            outputs: vec![GuardrailOutput {
                text: Some("something else".into()),
            }],
            ..ApplyGuardrailResponse::default()
        }),
        vec![json!({"trace": {"type": "mcp"}}), text("original")],
    );

    let result = h.pipeline.respond(&conversation(), "go").await.unwrap();
    assert_eq!(result.final_text(), "original");
    assert_eq!(h.guard.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn template_is_fetched_once_across_turns() {
    let h = harness(
        CountingLibrary::new(false),
        Vec::new(),
        ScriptedGuard::passing(),
        vec![text("ok")],
    );

    let first = h.pipeline.prepare("one").await.unwrap();
    let second = h.pipeline.prepare("two").await.unwrap();
    assert_eq!(h.library.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.prompt_text(), "Template revision 0");
    assert_eq!(second.prompt_text(), "Template revision 0");
}

#[tokio::test]
async fn citations_render_title_and_locator() {
    let h = harness(
        CountingLibrary::new(false),
        vec![
            json!({"content": {"document": {"title": "Runbook", "sourceUri": "s3://bucket/key"}}}),
            json!({"content": {"document": {}}}),
        ],
        ScriptedGuard::passing(),
        vec![text("ok")],
    );

    let prepared = h.pipeline.prepare("restart").await.unwrap();
    assert_eq!(
        prepared.citations(),
        ["Runbook (s3://bucket/key)".to_owned(), "Document ()".to_owned()]
    );
}

#[tokio::test]
async fn empty_retrieval_and_no_trace_returns_plain_result() {
    let h = harness(
        CountingLibrary::new(false),
        Vec::new(),
        ScriptedGuard::passing(),
        vec![text("Hello there.")],
    );

    let result = h.pipeline.respond(&conversation(), "hi").await.unwrap();
    assert!(result.citations().is_empty());
    assert!(result.safety_verdict().is_none());
    assert!(result.trace().is_empty());
    assert_eq!(result.provenance(), &Provenance::AgentNative);
}

#[tokio::test]
async fn intervention_without_outputs_withholds_the_answer() {
    let h = harness(
        CountingLibrary::new(false),
        Vec::new(),
        ScriptedGuard::new(ApplyGuardrailResponse {
            action: "GUARDRAIL_INTERVENED".into(),
            ..ApplyGuardrailResponse::default()
        }),
        vec![
            json!({"trace": {"type": "Tool_Use", "name": "shell"}}),
            text("rm -rf output"),
        ],
    );

    let result = h.pipeline.respond(&conversation(), "clean up").await.unwrap();
    assert_eq!(result.final_text(), WITHHELD_MESSAGE);
    assert_eq!(result.trace().len(), 1);
    assert!(result.trace()[0].is_tool_invocation());
}

#[tokio::test]
async fn failed_template_fetch_can_be_retried() {
    let h = harness(
        CountingLibrary::new(true),
        Vec::new(),
        ScriptedGuard::passing(),
        vec![text("ok")],
    );

    let err = h.pipeline.prepare("hi").await.unwrap_err();
    assert!(matches!(
        err,
        TurnError::Template(PromptError::Upstream(UpstreamError::NotFound { .. }))
    ));
    assert_eq!(err.stage(), "template");
    assert!(h.pipeline.templates().cached().is_none());

    let prepared = h.pipeline.prepare("hi").await.unwrap();
    assert_eq!(prepared.prompt_text(), "Template revision 1");
    assert_eq!(h.library.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stream_error_fails_the_turn() {
    let h = build(
        CountingLibrary::new(false),
        Vec::new(),
        ScriptedGuard::passing(),
        ScriptedRuntime {
            events: vec![text("partial")],
            fail_after: true,
        },
    );

    let err = h.pipeline.respond(&conversation(), "go").await.unwrap_err();
    assert!(matches!(err, TurnError::Agent(AdapterError::PermissionDenied { .. })));
    assert_eq!(err.stage(), "agent");
}

#[tokio::test]
async fn completed_turn_emits_latency_tokens_and_agent_id() {
    let sink = Arc::new(RecordingSink::default());
    let telemetry = Telemetry::builder().with_sink(sink.clone()).spawn();
    let h = harness(
        CountingLibrary::new(false),
        Vec::new(),
        ScriptedGuard::passing(),
        vec![json!({"delta": {"text": "ok"}, "metrics": {"outputTokens": 2}})],
    );
    let pipeline = h.pipeline.with_telemetry(telemetry.clone());

    pipeline.respond(&conversation(), "go").await.unwrap();
    telemetry.flush().await.unwrap();

    let metrics = sink.metrics.lock().unwrap();
    let names: Vec<_> = metrics.iter().map(Metric::name).collect();
    assert_eq!(names, [LATENCY_METRIC, OUTPUT_TOKENS_METRIC]);
    assert!((metrics[1].value() - 2.0).abs() < f64::EPSILON);
    assert_eq!(
        *sink.properties.lock().unwrap(),
        vec![("agentId".to_owned(), "agent-1".to_owned())]
    );
}

fn metered_turn() -> Harness {
    harness(
        CountingLibrary::new(false),
        Vec::new(),
        ScriptedGuard::passing(),
        vec![json!({"delta": {"text": "ok"}, "metrics": {"outputTokens": 2}})],
    )
}

#[tokio::test]
async fn failing_metric_sink_does_not_fail_the_turn() {
    let telemetry = Telemetry::builder().with_sink(Arc::new(FailingSink)).spawn();
    let pipeline = metered_turn().pipeline.with_telemetry(telemetry.clone());

    let result = pipeline.respond(&conversation(), "go").await.unwrap();
    assert_eq!(result.final_text(), "ok");
    assert_eq!(result.metrics().output_tokens(), 2);

    telemetry.flush().await.unwrap();
    let again = pipeline.respond(&conversation(), "go").await.unwrap();
    assert_eq!(again.metrics().output_tokens(), 2);
}

#[tokio::test]
async fn stalled_metric_sink_does_not_block_the_turn() {
    let telemetry = Telemetry::builder().with_sink(Arc::new(StalledSink)).spawn();
    let pipeline = metered_turn().pipeline.with_telemetry(telemetry.clone());

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.respond(&conversation(), "go"),
    )
    .await
    .expect("turn waited on the metric sink")
    .unwrap();
    assert_eq!(result.final_text(), "ok");
    assert_eq!(result.metrics().output_tokens(), 2);

    let flushed = tokio::time::timeout(Duration::from_millis(50), telemetry.flush()).await;
    assert!(flushed.is_err());
}
