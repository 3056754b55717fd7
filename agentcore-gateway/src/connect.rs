//! Wiring a [`GatewayConfig`] to the HTTP service clients.

use std::sync::Arc;

use agent_adapters::{
    AdapterError, HttpAgentRuntime, HttpFeedbackStore, HttpGuardrailClient, HttpKnowledgeStore,
    HttpMetricSink, HttpPromptLibrary, ServiceEndpoint,
};
use agent_config::{GatewayConfig, ObservabilityConfig};
use agent_kernel::{AgentGateway, GatewayError, SchedulerConfig};
use agent_policy::SafetyFilter;
use agent_prompts::TemplateCache;
use agent_retrieval::ContextRetriever;
use agent_telemetry::{FileFeedbackStore, Telemetry, TelemetryError, TracingSink};
use agent_tools::Bootstrapper;
use thiserror::Error;
use tracing::info;

/// Errors raised while connecting a gateway.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// An HTTP client could not be built.
    #[error("service client setup failed: {0}")]
    Client(#[from] AdapterError),
    /// The local feedback store could not be opened.
    #[error("telemetry setup failed: {0}")]
    Telemetry(#[from] TelemetryError),
    /// Gateway construction failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Builds the service endpoint shared by every client.
fn endpoint(config: &GatewayConfig) -> Result<ServiceEndpoint, AdapterError> {
    let mut endpoint =
        ServiceEndpoint::new(&config.service.endpoint)?.with_timeout(config.service.timeout);
    if let Some(api_key) = &config.service.api_key {
        endpoint = endpoint.with_api_key(api_key);
    }
    Ok(endpoint)
}

/// Starts the telemetry dispatcher described by `observability`.
///
/// A tracing sink is always attached. The remote metric sink, the local
/// feedback file and the remote feedback store are each optional.
///
/// # Errors
///
/// Returns [`ConnectError`] when a client cannot be built or the feedback
/// file cannot be opened.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
pub async fn build_telemetry(
    observability: &ObservabilityConfig,
    endpoint: &ServiceEndpoint,
) -> Result<Telemetry, ConnectError> {
    let mut builder = Telemetry::builder()
        .queue_capacity(observability.queue_capacity)
        .with_sink(Arc::new(TracingSink::new(&observability.namespace)));

    if observability.metrics_enabled {
        builder = builder.with_sink(Arc::new(HttpMetricSink::new(
            endpoint.clone(),
            &observability.namespace,
        )?));
    }
    if let Some(path) = &observability.feedback_path {
        builder = builder.with_feedback_store(Arc::new(FileFeedbackStore::open(path).await?));
    }
    if observability.remote_feedback {
        builder = builder.with_feedback_store(Arc::new(HttpFeedbackStore::new(endpoint.clone())?));
    }

    Ok(builder.spawn())
}

/// Starts a telemetry dispatcher carrying only the configured feedback
/// stores, for recording ratings without connecting a gateway.
///
/// # Errors
///
/// Returns [`ConnectError`] when the remote store client cannot be built or
/// the feedback file cannot be opened.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
pub async fn feedback_telemetry(config: &GatewayConfig) -> Result<Telemetry, ConnectError> {
    let observability = &config.observability;
    let mut builder = Telemetry::builder().queue_capacity(observability.queue_capacity);
    if let Some(path) = &observability.feedback_path {
        builder = builder.with_feedback_store(Arc::new(FileFeedbackStore::open(path).await?));
    }
    if observability.remote_feedback {
        builder =
            builder.with_feedback_store(Arc::new(HttpFeedbackStore::new(endpoint(config)?)?));
    }
    Ok(builder.spawn())
}

/// Builds every HTTP client from `config`, bootstraps the configured tool
/// repositories and returns a ready gateway.
///
/// # Errors
///
/// Returns [`ConnectError`] when a client cannot be built, telemetry cannot
/// start, or gateway construction fails.
pub async fn connect(config: &GatewayConfig) -> Result<AgentGateway, ConnectError> {
    let endpoint = endpoint(config)?;
    let telemetry = build_telemetry(&config.observability, &endpoint).await?;

    let templates = TemplateCache::new(
        config.prompt.clone(),
        Arc::new(HttpPromptLibrary::new(endpoint.clone())?),
    );
    let retriever = ContextRetriever::new(
        config.knowledge_base.clone(),
        Arc::new(HttpKnowledgeStore::new(endpoint.clone())?),
    );
    let filter = SafetyFilter::new(
        config.guardrail.clone(),
        Arc::new(HttpGuardrailClient::new(endpoint.clone())?),
    );
    let runtime = Arc::new(HttpAgentRuntime::new(endpoint.clone())?);
    let bootstrapper =
        Bootstrapper::new(&config.tools.install_dir, config.tools.repositories.clone());

    info!(
        endpoint = endpoint.base_url(),
        agent_id = config.identity.agent_id(),
        repositories = config.tools.repositories.len(),
        "connecting agent gateway"
    );

    let gateway = AgentGateway::builder()
        .identity(config.identity.clone())
        .templates(templates)
        .retriever(retriever)
        .safety_filter(filter)
        .runtime(runtime)
        .bootstrapper(bootstrapper)
        .telemetry(telemetry)
        .scheduler(SchedulerConfig::new(config.max_concurrent_turns))
        .build()
        .await?;

    Ok(gateway)
}
