//! Gateway construction and turn entry points.

use std::fmt;
use std::sync::Arc;

use agent_adapters::{AdapterError, AgentRuntime};
use agent_policy::SafetyFilter;
use agent_primitives::{AgentIdentity, ConversationId};
use agent_prompts::TemplateCache;
use agent_retrieval::ContextRetriever;
use agent_telemetry::{FeedbackRating, FeedbackRecord, Telemetry, TelemetryError, TelemetryResult};
use agent_tools::{BootstrapError, Bootstrapper, ToolDescriptor};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::PipelineResult;
use crate::pipeline::{PreparedRequest, TurnPipeline, TurnResult};
use crate::provenance::ProvenanceDetector;
use crate::scheduler::{SchedulerConfig, SchedulerResult, TurnScheduler};

/// Errors raised while constructing a gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required component was not supplied to the builder.
    #[error("gateway component `{0}` is required")]
    MissingComponent(&'static str),
    /// Tool bootstrap failed.
    #[error("tool bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),
    /// The bootstrap task panicked or was cancelled.
    #[error("tool bootstrap task failed: {0}")]
    BootstrapTask(String),
    /// The remote agent rejected the tool registration.
    #[error("tool registration failed: {0}")]
    Registration(#[from] AdapterError),
}

/// Result alias for gateway construction.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Builder for [`AgentGateway`].
#[derive(Default)]
pub struct AgentGatewayBuilder {
    identity: Option<AgentIdentity>,
    templates: Option<TemplateCache>,
    retriever: Option<ContextRetriever>,
    filter: Option<SafetyFilter>,
    runtime: Option<Arc<dyn AgentRuntime>>,
    bootstrapper: Option<Bootstrapper>,
    telemetry: Option<Telemetry>,
    scheduler: SchedulerConfig,
}

impl fmt::Debug for AgentGatewayBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentGatewayBuilder")
            .field("identity", &self.identity)
            .field("runtime_configured", &self.runtime.is_some())
            .field("bootstrapper", &self.bootstrapper)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl AgentGatewayBuilder {
    /// Sets the fronted agent.
    #[must_use]
    pub fn identity(mut self, identity: AgentIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Sets the template cache.
    #[must_use]
    pub fn templates(mut self, templates: TemplateCache) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Sets the context retriever.
    #[must_use]
    pub fn retriever(mut self, retriever: ContextRetriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Sets the safety filter.
    #[must_use]
    pub fn safety_filter(mut self, filter: SafetyFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the remote agent runtime.
    #[must_use]
    pub fn runtime(mut self, runtime: Arc<dyn AgentRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Sets the tool bootstrapper. Without one no tools are installed, but
    /// the empty set is still registered.
    #[must_use]
    pub fn bootstrapper(mut self, bootstrapper: Bootstrapper) -> Self {
        self.bootstrapper = Some(bootstrapper);
        self
    }

    /// Sets the telemetry handle.
    #[must_use]
    pub fn telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Sets the scheduler bound.
    #[must_use]
    pub fn scheduler(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    /// Bootstraps tools, registers them with the agent and returns a ready
    /// gateway.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingComponent`] when a required component
    /// was not supplied, [`GatewayError::Bootstrap`] or
    /// [`GatewayError::BootstrapTask`] when tool installation fails and
    /// [`GatewayError::Registration`] when the agent rejects the tools.
    pub async fn build(self) -> GatewayResult<AgentGateway> {
        let identity = self
            .identity
            .ok_or(GatewayError::MissingComponent("identity"))?;
        let templates = self
            .templates
            .ok_or(GatewayError::MissingComponent("templates"))?;
        let retriever = self
            .retriever
            .ok_or(GatewayError::MissingComponent("retriever"))?;
        let filter = self
            .filter
            .ok_or(GatewayError::MissingComponent("safety_filter"))?;
        let runtime = self
            .runtime
            .ok_or(GatewayError::MissingComponent("runtime"))?;

        let tools = match self.bootstrapper {
            Some(bootstrapper) => tokio::task::spawn_blocking(move || bootstrapper.bootstrap())
                .await
                .map_err(|err| GatewayError::BootstrapTask(err.to_string()))??,
            None => Vec::new(),
        };

        runtime.register_tools(&identity, &tools).await?;
        info!(
            agent_id = identity.agent_id(),
            alias_id = identity.alias_id(),
            tools = tools.len(),
            "tools registered with agent"
        );

        let detector =
            ProvenanceDetector::default().with_keywords(tools.iter().map(ToolDescriptor::name));
        let mut pipeline = TurnPipeline::new(identity, templates, retriever, filter, runtime)
            .with_detector(detector);
        if let Some(telemetry) = self.telemetry {
            pipeline = pipeline.with_telemetry(telemetry);
        }

        Ok(AgentGateway {
            pipeline: Arc::new(pipeline),
            scheduler: TurnScheduler::new(self.scheduler),
            tools,
        })
    }
}

/// A constructed gateway fronting one remote agent.
#[derive(Debug, Clone)]
pub struct AgentGateway {
    pipeline: Arc<TurnPipeline>,
    scheduler: TurnScheduler,
    tools: Vec<ToolDescriptor>,
}

impl AgentGateway {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> AgentGatewayBuilder {
        AgentGatewayBuilder::default()
    }

    /// The underlying pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &TurnPipeline {
        &self.pipeline
    }

    /// Tools installed and registered during construction.
    #[must_use]
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Telemetry handle, if configured.
    #[must_use]
    pub fn telemetry(&self) -> Option<&Telemetry> {
        self.pipeline.telemetry()
    }

    /// See [`TurnPipeline::prepare`].
    ///
    /// # Errors
    ///
    /// Propagates pipeline failures.
    pub async fn prepare(&self, user_input: &str) -> PipelineResult<PreparedRequest> {
        self.pipeline.prepare(user_input).await
    }

    /// See [`TurnPipeline::complete`].
    ///
    /// # Errors
    ///
    /// Propagates pipeline failures.
    pub async fn complete(
        &self,
        conversation_id: &ConversationId,
        prepared: PreparedRequest,
    ) -> PipelineResult<TurnResult> {
        self.pipeline.complete(conversation_id, prepared).await
    }

    /// See [`TurnPipeline::respond`].
    ///
    /// # Errors
    ///
    /// Propagates pipeline failures.
    pub async fn respond(
        &self,
        conversation_id: &ConversationId,
        user_input: &str,
    ) -> PipelineResult<TurnResult> {
        self.pipeline.respond(conversation_id, user_input).await
    }

    /// Runs a turn on the bounded scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Closed`](crate::SchedulerError::Closed)
    /// after [`close`](Self::close).
    pub fn schedule(
        &self,
        conversation_id: ConversationId,
        user_input: impl Into<String>,
    ) -> SchedulerResult<JoinHandle<SchedulerResult<PipelineResult<TurnResult>>>> {
        let pipeline = Arc::clone(&self.pipeline);
        let user_input = user_input.into();
        self.scheduler
            .spawn(async move { pipeline.respond(&conversation_id, &user_input).await })
    }

    /// Stores a user rating for a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::FeedbackDisabled`] when no feedback store is
    /// configured, or the first store failure.
    pub async fn record_feedback(
        &self,
        conversation_id: ConversationId,
        rating: FeedbackRating,
        notes: impl Into<String>,
    ) -> TelemetryResult<()> {
        let telemetry = self.telemetry().ok_or(TelemetryError::FeedbackDisabled)?;
        let record = FeedbackRecord::new(conversation_id, rating, notes);
        telemetry.record_feedback(&record).await
    }

    /// Rejects new scheduled turns and flushes queued telemetry.
    pub async fn close(&self) {
        self.scheduler.close();
        if let Some(telemetry) = self.telemetry() {
            if let Err(err) = telemetry.flush().await {
                warn!(error = %err, "telemetry flush failed during close");
            }
        }
    }
}
