//! Metric and property records.

use serde::{Deserialize, Serialize};

/// Turn latency in milliseconds.
pub const LATENCY_METRIC: &str = "LatencyMs";

/// Output tokens reported by the agent for a turn.
pub const OUTPUT_TOKENS_METRIC: &str = "OutputTokens";

/// Property carrying the agent identifier.
pub const AGENT_ID_PROPERTY: &str = "agentId";

/// Unit attached to a metric datum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricUnit {
    /// Plain count.
    Count,
    /// Milliseconds.
    Milliseconds,
}

impl MetricUnit {
    /// Wire label for the unit.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Milliseconds => "Milliseconds",
        }
    }
}

/// Named numeric datum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    name: String,
    value: f64,
    unit: MetricUnit,
}

impl Metric {
    /// Creates a metric.
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64, unit: MetricUnit) -> Self {
        Self {
            name: name.into(),
            value,
            unit,
        }
    }

    /// Creates a count metric.
    #[must_use]
    pub fn count(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, value, MetricUnit::Count)
    }

    /// Metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Metric value.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Metric unit.
    #[must_use]
    pub fn unit(&self) -> MetricUnit {
        self.unit
    }
}

/// Named string property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// Property value.
    pub value: String,
}

impl Property {
    /// Creates a property.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Metrics and properties emitted together for one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryBatch {
    metrics: Vec<Metric>,
    properties: Vec<Property>,
}

impl TelemetryBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a metric.
    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push(Property::new(name, value));
        self
    }

    /// Metrics in insertion order.
    #[must_use]
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Properties in insertion order.
    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Returns true when the batch carries nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.properties.is_empty()
    }
}
