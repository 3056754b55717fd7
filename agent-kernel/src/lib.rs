//! Turn orchestration for the agent gateway.
//!
//! A turn runs in two phases. [`TurnPipeline::prepare`] fetches the cached
//! prompt template and retrieval context; [`TurnPipeline::complete`] invokes
//! the remote agent, drains its event stream, classifies provenance,
//! re-screens tool-sourced output and queues telemetry. [`AgentGateway`]
//! bootstraps tools once, registers them with the agent and runs turns on a
//! bounded scheduler.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod gateway;
mod pipeline;
pub mod provenance;
mod scheduler;
mod state;
mod stream;

pub use error::{PipelineResult, TurnError};
pub use gateway::{AgentGateway, AgentGatewayBuilder, GatewayError, GatewayResult};
pub use pipeline::{PreparedRequest, TurnMetrics, TurnPipeline, TurnResult, WITHHELD_MESSAGE};
pub use provenance::{Provenance, ProvenanceDetector, ProvenanceSignal, TraceEvent};
pub use scheduler::{
    DEFAULT_MAX_CONCURRENT_TURNS, SchedulerConfig, SchedulerError, SchedulerResult, TurnScheduler,
};
pub use state::{TurnEvent, TurnLifecycle, TurnState, TurnStateError};
pub use stream::{StreamAggregator, StreamOutcome};
