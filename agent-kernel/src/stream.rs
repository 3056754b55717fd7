//! Draining the agent event stream into a single answer.

use agent_adapters::{AdapterResult, AgentEvent, AgentEventStream};
use futures::StreamExt;
use tracing::trace;

use crate::provenance::{ProvenanceDetector, ProvenanceSignal, TraceEvent};

/// Folds streamed events in arrival order.
#[derive(Debug)]
pub struct StreamAggregator<'a> {
    detector: &'a ProvenanceDetector,
    text: String,
    output_tokens: u64,
    trace: Vec<TraceEvent>,
    signal: Option<ProvenanceSignal>,
    events: usize,
}

impl<'a> StreamAggregator<'a> {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new(detector: &'a ProvenanceDetector) -> Self {
        Self {
            detector,
            text: String::new(),
            output_tokens: 0,
            trace: Vec::new(),
            signal: None,
            events: 0,
        }
    }

    /// Folds one event. Provenance is only inspected until the first signal.
    pub fn observe(&mut self, event: &AgentEvent) {
        self.events += 1;
        if let Some(delta) = event.text_delta() {
            self.text.push_str(delta);
        }
        self.output_tokens = self.output_tokens.saturating_add(event.output_tokens());

        let trace_event = event.trace().cloned().map(TraceEvent::classify);
        if self.signal.is_none() {
            self.signal = self.detector.inspect(trace_event.as_ref(), event.raw());
            if let Some(signal) = &self.signal {
                trace!(%signal, event = self.events, "tool provenance detected");
            }
        }
        if let Some(trace_event) = trace_event {
            self.trace.push(trace_event);
        }
    }

    /// Drains `stream` to its end. The first stream error aborts the drain
    /// and discards everything folded so far.
    ///
    /// # Errors
    ///
    /// Returns the first error yielded by the stream.
    pub async fn drain(mut self, mut stream: AgentEventStream) -> AdapterResult<StreamOutcome> {
        while let Some(event) = stream.next().await {
            self.observe(&event?);
        }
        Ok(self.finish())
    }

    /// Consumes the aggregator.
    #[must_use]
    pub fn finish(self) -> StreamOutcome {
        StreamOutcome {
            text: self.text,
            output_tokens: self.output_tokens,
            trace: self.trace,
            signal: self.signal,
            events: self.events,
        }
    }
}

/// Everything collected from one drained stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    /// Concatenated text deltas.
    pub text: String,
    /// Sum of reported output tokens.
    pub output_tokens: u64,
    /// Trace records in arrival order.
    pub trace: Vec<TraceEvent>,
    /// First tool provenance signal, if any.
    pub signal: Option<ProvenanceSignal>,
    /// Number of events observed.
    pub events: usize,
}

impl StreamOutcome {
    /// Returns `true` if any trace record was a knowledge base lookup.
    #[must_use]
    pub fn consulted_knowledge_base(&self) -> bool {
        self.trace.iter().any(TraceEvent::is_knowledge_base_lookup)
    }
}
