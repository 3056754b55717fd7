//! Metric sink contract and the built-in tracing sink.

use async_trait::async_trait;
use tracing::info;

use crate::TelemetryResult;
use crate::metric::Metric;

/// Destination for metrics and properties.
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Publishes one metric datum.
    async fn put_metric(&self, metric: &Metric) -> TelemetryResult<()>;

    /// Publishes one string property.
    async fn put_property(&self, name: &str, value: &str) -> TelemetryResult<()>;
}

/// Sink that writes every datum to the `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct TracingSink {
    namespace: String,
}

impl TracingSink {
    /// Creates a sink tagging records with `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl MetricSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn put_metric(&self, metric: &Metric) -> TelemetryResult<()> {
        info!(
            target: "agent_telemetry::metrics",
            namespace = %self.namespace,
            metric = metric.name(),
            value = metric.value(),
            unit = metric.unit().as_str(),
            "metric"
        );
        Ok(())
    }

    async fn put_property(&self, name: &str, value: &str) -> TelemetryResult<()> {
        info!(
            target: "agent_telemetry::metrics",
            namespace = %self.namespace,
            property = name,
            value,
            "property"
        );
        Ok(())
    }
}
