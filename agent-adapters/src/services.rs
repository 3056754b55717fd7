//! HTTP clients for the prompt library, knowledge store, guardrail and
//! monitoring services.

use agent_policy::{ApplyGuardrailRequest, ApplyGuardrailResponse, GuardrailClient};
use agent_primitives::UpstreamResult;
use agent_prompts::{GetPromptRequest, GetPromptResponse, PromptLibrary};
use agent_retrieval::{KnowledgeStore, RetrieveRequest, RetrieveResponse, RetrievedPassage};
use agent_telemetry::{FeedbackRecord, FeedbackStore, Metric, MetricSink, TelemetryResult};
use async_trait::async_trait;
use serde::Serialize;

use crate::http_client::{HttpJsonClient, ServiceEndpoint};
use crate::traits::AdapterResult;

const PROMPTS_GET: &str = "prompts/get";
const KNOWLEDGE_BASE_RETRIEVE: &str = "knowledge-bases/retrieve";
const GUARDRAILS_APPLY: &str = "guardrails/apply";
const METRICS_PUT: &str = "metrics/put";
const METRICS_PROPERTY: &str = "metrics/property";
const FEEDBACK_PUT: &str = "feedback/put";

/// Prompt library client.
#[derive(Debug, Clone)]
pub struct HttpPromptLibrary {
    http: HttpJsonClient,
}

impl HttpPromptLibrary {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AdapterError::Configuration`] if the HTTPS client
    /// cannot be built.
    pub fn new(endpoint: ServiceEndpoint) -> AdapterResult<Self> {
        Ok(Self {
            http: HttpJsonClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl PromptLibrary for HttpPromptLibrary {
    async fn get_prompt(&self, request: &GetPromptRequest) -> UpstreamResult<GetPromptResponse> {
        self.http.post_json(PROMPTS_GET, request).await
    }
}

/// Knowledge store client.
#[derive(Debug, Clone)]
pub struct HttpKnowledgeStore {
    http: HttpJsonClient,
}

impl HttpKnowledgeStore {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AdapterError::Configuration`] if the HTTPS client
    /// cannot be built.
    pub fn new(endpoint: ServiceEndpoint) -> AdapterResult<Self> {
        Ok(Self {
            http: HttpJsonClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl KnowledgeStore for HttpKnowledgeStore {
    async fn retrieve(&self, request: &RetrieveRequest) -> UpstreamResult<Vec<RetrievedPassage>> {
        let response: RetrieveResponse = self.http.post_json(KNOWLEDGE_BASE_RETRIEVE, request).await?;
        Ok(response.retrieved_results)
    }
}

/// Guardrail service client.
#[derive(Debug, Clone)]
pub struct HttpGuardrailClient {
    http: HttpJsonClient,
}

impl HttpGuardrailClient {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AdapterError::Configuration`] if the HTTPS client
    /// cannot be built.
    pub fn new(endpoint: ServiceEndpoint) -> AdapterResult<Self> {
        Ok(Self {
            http: HttpJsonClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl GuardrailClient for HttpGuardrailClient {
    async fn apply_guardrail(
        &self,
        request: &ApplyGuardrailRequest,
    ) -> UpstreamResult<ApplyGuardrailResponse> {
        self.http.post_json(GUARDRAILS_APPLY, request).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutMetricRequest<'a> {
    namespace: &'a str,
    metric_name: &'a str,
    value: f64,
    unit: &'static str,
}

#[derive(Serialize)]
struct PutPropertyRequest<'a> {
    namespace: &'a str,
    name: &'a str,
    value: &'a str,
}

/// Metric sink publishing to the remote monitoring service.
#[derive(Debug, Clone)]
pub struct HttpMetricSink {
    http: HttpJsonClient,
    namespace: String,
}

impl HttpMetricSink {
    /// Creates a sink publishing under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AdapterError::Configuration`] if the HTTPS client
    /// cannot be built.
    pub fn new(endpoint: ServiceEndpoint, namespace: impl Into<String>) -> AdapterResult<Self> {
        Ok(Self {
            http: HttpJsonClient::new(endpoint)?,
            namespace: namespace.into(),
        })
    }
}

#[async_trait]
impl MetricSink for HttpMetricSink {
    fn name(&self) -> &str {
        "monitoring"
    }

    async fn put_metric(&self, metric: &Metric) -> TelemetryResult<()> {
        let request = PutMetricRequest {
            namespace: &self.namespace,
            metric_name: metric.name(),
            value: metric.value(),
            unit: metric.unit().as_str(),
        };
        Ok(self.http.post_ignored(METRICS_PUT, &request).await?)
    }

    async fn put_property(&self, name: &str, value: &str) -> TelemetryResult<()> {
        let request = PutPropertyRequest {
            namespace: &self.namespace,
            name,
            value,
        };
        Ok(self.http.post_ignored(METRICS_PROPERTY, &request).await?)
    }
}

/// Feedback store backed by the remote monitoring service.
#[derive(Debug, Clone)]
pub struct HttpFeedbackStore {
    http: HttpJsonClient,
}

impl HttpFeedbackStore {
    /// Creates a store for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AdapterError::Configuration`] if the HTTPS client
    /// cannot be built.
    pub fn new(endpoint: ServiceEndpoint) -> AdapterResult<Self> {
        Ok(Self {
            http: HttpJsonClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl FeedbackStore for HttpFeedbackStore {
    async fn put_feedback(&self, record: &FeedbackRecord) -> TelemetryResult<()> {
        Ok(self.http.post_ignored(FEEDBACK_PUT, record).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_telemetry::MetricUnit;

    #[test]
    fn metric_request_uses_wire_names() {
        let metric = Metric::new("LatencyMs", 42.0, MetricUnit::Milliseconds);
        let request = PutMetricRequest {
            namespace: "AgentCore/Gateway",
            metric_name: metric.name(),
            value: metric.value(),
            unit: metric.unit().as_str(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["metricName"], "LatencyMs");
        assert_eq!(value["unit"], "Milliseconds");
        assert_eq!(value["namespace"], "AgentCore/Gateway");
    }
}
