//! Observability for the agent gateway.
//!
//! Turn metrics are queued on a bounded channel and fanned out to every
//! configured [`MetricSink`] by a background task, so emission never delays a
//! response. Feedback is written synchronously to the configured
//! [`FeedbackStore`]s because the user is told whether it was captured.

#![warn(missing_docs, clippy::pedantic)]

pub mod dispatcher;
mod error;
pub mod feedback;
pub mod metric;
pub mod sink;

pub use dispatcher::{DEFAULT_QUEUE_CAPACITY, Telemetry, TelemetryBuilder};
pub use error::{TelemetryError, TelemetryResult};
pub use feedback::{
    FeedbackRating, FeedbackRecord, FeedbackStore, FileFeedbackStore, ParseRatingError,
};
pub use metric::{
    AGENT_ID_PROPERTY, LATENCY_METRIC, Metric, MetricUnit, OUTPUT_TOKENS_METRIC, Property,
    TelemetryBatch,
};
pub use sink::{MetricSink, TracingSink};
