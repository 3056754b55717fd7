//! Per-turn orchestration: prepare, complete and respond.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use agent_adapters::{
    AgentRuntime, InvocationAttributes, InvokeAgentRequest, KnowledgeBaseReference, SessionState,
};
use agent_policy::{SafetyFilter, SafetyVerdict};
use agent_primitives::{AgentIdentity, ConversationId};
use agent_prompts::TemplateCache;
use agent_retrieval::ContextRetriever;
use agent_telemetry::{
    AGENT_ID_PROPERTY, LATENCY_METRIC, Metric, MetricUnit, OUTPUT_TOKENS_METRIC, Telemetry,
    TelemetryBatch,
};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::PipelineResult;
use crate::provenance::{Provenance, ProvenanceDetector, TraceEvent};
use crate::state::{TurnEvent, TurnLifecycle};
use crate::stream::StreamAggregator;

/// Text returned when the safety filter intervened without a usable
/// replacement.
pub const WITHHELD_MESSAGE: &str =
    "The response was withheld because it did not pass the safety review.";

/// Request assembled by [`TurnPipeline::prepare`].
///
/// Only the pipeline can build one, so the prompt text is never empty and
/// the session state is always well formed. It is consumed by value by
/// [`TurnPipeline::complete`].
#[derive(Debug, PartialEq)]
pub struct PreparedRequest {
    input_text: String,
    prompt_text: String,
    session_state: SessionState,
    citations: Vec<String>,
    lifecycle: TurnLifecycle,
}

impl PreparedRequest {
    /// Raw user text.
    #[must_use]
    pub fn input_text(&self) -> &str {
        &self.input_text
    }

    /// Prompt template text, for previews.
    #[must_use]
    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    /// Session state sent with the invocation.
    #[must_use]
    pub fn session_state(&self) -> &SessionState {
        &self.session_state
    }

    /// Citations rendered from the retrieved passages.
    #[must_use]
    pub fn citations(&self) -> &[String] {
        &self.citations
    }
}

/// Latency and usage of one completed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnMetrics {
    latency: Duration,
    output_tokens: u64,
}

impl TurnMetrics {
    /// Wall-clock time spent in `complete`.
    #[must_use]
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Latency in seconds.
    #[must_use]
    pub fn latency_seconds(&self) -> f64 {
        self.latency.as_secs_f64()
    }

    /// Latency in milliseconds, as reported to telemetry.
    #[must_use]
    pub fn latency_millis(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }

    /// Sum of output tokens reported by the stream.
    #[must_use]
    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }
}

/// Final artifact of a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResult {
    final_text: String,
    citations: Vec<String>,
    metrics: TurnMetrics,
    safety_verdict: Option<SafetyVerdict>,
    provenance: Provenance,
    trace: Vec<TraceEvent>,
}

impl TurnResult {
    /// Text to show the user.
    #[must_use]
    pub fn final_text(&self) -> &str {
        &self.final_text
    }

    /// Citations gathered during `prepare`.
    #[must_use]
    pub fn citations(&self) -> &[String] {
        &self.citations
    }

    /// Latency and usage.
    #[must_use]
    pub fn metrics(&self) -> TurnMetrics {
        self.metrics
    }

    /// Verdict, present only when tool output was re-screened.
    #[must_use]
    pub fn safety_verdict(&self) -> Option<&SafetyVerdict> {
        self.safety_verdict.as_ref()
    }

    /// Where the answer came from.
    #[must_use]
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Trace records observed while streaming.
    #[must_use]
    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }
}

/// Composes the template cache, retriever, agent runtime, safety filter and
/// telemetry into the two-phase turn protocol.
pub struct TurnPipeline {
    identity: AgentIdentity,
    templates: TemplateCache,
    retriever: ContextRetriever,
    filter: SafetyFilter,
    runtime: Arc<dyn AgentRuntime>,
    telemetry: Option<Telemetry>,
    detector: ProvenanceDetector,
}

impl fmt::Debug for TurnPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnPipeline")
            .field("agent_id", &self.identity.agent_id())
            .field("prompt", &self.templates.config().prompt_identifier())
            .field(
                "knowledge_base",
                &self.retriever.config().knowledge_base_id(),
            )
            .field("guardrail", &self.filter.config().identifier())
            .field("telemetry_configured", &self.telemetry.is_some())
            .finish_non_exhaustive()
    }
}

impl TurnPipeline {
    /// Creates a pipeline without telemetry and with the default detector.
    #[must_use]
    pub fn new(
        identity: AgentIdentity,
        templates: TemplateCache,
        retriever: ContextRetriever,
        filter: SafetyFilter,
        runtime: Arc<dyn AgentRuntime>,
    ) -> Self {
        Self {
            identity,
            templates,
            retriever,
            filter,
            runtime,
            telemetry: None,
            detector: ProvenanceDetector::default(),
        }
    }

    /// Attaches a telemetry handle.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Replaces the provenance detector.
    #[must_use]
    pub fn with_detector(mut self, detector: ProvenanceDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Identity of the fronted agent.
    #[must_use]
    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    /// Template cache shared by all turns.
    #[must_use]
    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    /// Telemetry handle, if configured.
    #[must_use]
    pub fn telemetry(&self) -> Option<&Telemetry> {
        self.telemetry.as_ref()
    }

    /// Assembles the request for one turn without calling the agent.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Template`](crate::TurnError::Template) when the
    /// template cannot be fetched and
    /// [`TurnError::Retrieval`](crate::TurnError::Retrieval) when the
    /// knowledge base query fails.
    pub async fn prepare(&self, user_input: &str) -> PipelineResult<PreparedRequest> {
        let mut lifecycle = TurnLifecycle::new();
        let template = self.templates.fetch().await?;
        let passages = self.retriever.retrieve(user_input).await?;
        let citations = ContextRetriever::to_citations(&passages);

        let session_state = SessionState {
            invocation_attributes: InvocationAttributes {
                knowledge_base_configurations: vec![KnowledgeBaseReference {
                    knowledge_base_id: self.retriever.config().knowledge_base_id().to_owned(),
                    model_arn: template.model_reference().map(str::to_owned),
                }],
                retrieved_references: passages,
            },
        };

        lifecycle.transition(TurnEvent::Prepare)?;
        debug!(
            template = template.name(),
            citations = citations.len(),
            "turn prepared"
        );

        Ok(PreparedRequest {
            input_text: user_input.to_owned(),
            prompt_text: template.text().to_owned(),
            session_state,
            citations,
            lifecycle,
        })
    }

    /// Invokes the agent with a prepared request and assembles the result.
    ///
    /// Tool-sourced output with non-empty text is re-screened by the safety
    /// filter. Telemetry is queued without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Agent`](crate::TurnError::Agent) when the
    /// invocation or its stream fails and
    /// [`TurnError::Guardrail`](crate::TurnError::Guardrail) when the
    /// re-screen fails. No partial result is produced.
    pub async fn complete(
        &self,
        conversation_id: &ConversationId,
        prepared: PreparedRequest,
    ) -> PipelineResult<TurnResult> {
        let started = Instant::now();
        let PreparedRequest {
            input_text,
            session_state,
            citations,
            mut lifecycle,
            ..
        } = prepared;

        let request = InvokeAgentRequest {
            agent_id: self.identity.agent_id().to_owned(),
            agent_alias_id: self.identity.alias_id().to_owned(),
            session_id: conversation_id.clone(),
            end_session: false,
            input_text,
            session_state,
            guardrail: self.filter.runtime_parameters(),
        };

        let stream = self.runtime.invoke(request).await?;
        lifecycle.transition(TurnEvent::OpenStream)?;

        let outcome = StreamAggregator::new(&self.detector).drain(stream).await?;
        lifecycle.transition(TurnEvent::StreamDrained)?;

        let provenance = match outcome.signal.clone() {
            Some(signal) => Provenance::ToolSourced(signal),
            None if !citations.is_empty() || outcome.consulted_knowledge_base() => {
                Provenance::KnowledgeBase
            }
            None => Provenance::AgentNative,
        };

        let mut final_text = outcome.text;
        let mut safety_verdict = None;
        if provenance.is_tool_sourced() && !final_text.is_empty() {
            let verdict = self.filter.apply_to_output(&final_text).await?;
            lifecycle.transition(TurnEvent::ApplyFilter)?;
            if verdict.intervened() {
                final_text = verdict
                    .replacement_text()
                    .unwrap_or(WITHHELD_MESSAGE)
                    .to_owned();
            }
            safety_verdict = Some(verdict);
        }

        let metrics = TurnMetrics {
            latency: started.elapsed(),
            output_tokens: outcome.output_tokens,
        };
        self.emit_metrics(metrics);
        lifecycle.transition(TurnEvent::Finalize)?;

        info!(
            conversation_id = %conversation_id,
            provenance = provenance.label(),
            intervened = safety_verdict.as_ref().is_some_and(SafetyVerdict::intervened),
            latency_ms = metrics.latency_millis(),
            output_tokens = metrics.output_tokens(),
            "turn completed"
        );

        Ok(TurnResult {
            final_text,
            citations,
            metrics,
            safety_verdict,
            provenance,
            trace: outcome.trace,
        })
    }

    /// Runs [`prepare`](Self::prepare) then [`complete`](Self::complete).
    ///
    /// # Errors
    ///
    /// Returns the first stage failure.
    pub async fn respond(
        &self,
        conversation_id: &ConversationId,
        user_input: &str,
    ) -> PipelineResult<TurnResult> {
        let prepared = self.prepare(user_input).await?;
        self.complete(conversation_id, prepared).await
    }

    #[allow(clippy::cast_precision_loss)]
    fn emit_metrics(&self, metrics: TurnMetrics) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };
        let batch = TelemetryBatch::new()
            .with_metric(Metric::new(
                LATENCY_METRIC,
                metrics.latency_millis(),
                MetricUnit::Milliseconds,
            ))
            .with_metric(Metric::count(
                OUTPUT_TOKENS_METRIC,
                metrics.output_tokens() as f64,
            ))
            .with_property(AGENT_ID_PROPERTY, self.identity.agent_id());
        telemetry.emit(batch);
    }
}
