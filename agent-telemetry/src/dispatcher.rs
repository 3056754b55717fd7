//! Bounded, non-blocking telemetry dispatch.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::feedback::{FeedbackRecord, FeedbackStore};
use crate::metric::TelemetryBatch;
use crate::sink::MetricSink;
use crate::{TelemetryError, TelemetryResult};

/// Channel bound used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(value) => value,
    None => unreachable!(),
};

enum Command {
    Emit(TelemetryBatch),
    Flush(oneshot::Sender<()>),
}

/// Builder for [`Telemetry`].
pub struct TelemetryBuilder {
    capacity: NonZeroUsize,
    sinks: Vec<Arc<dyn MetricSink>>,
    feedback_stores: Vec<Arc<dyn FeedbackStore>>,
}

impl Default for TelemetryBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            sinks: Vec::new(),
            feedback_stores: Vec::new(),
        }
    }
}

impl TelemetryBuilder {
    /// Sets the dispatch channel bound.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Adds a metric sink. Every batch is delivered to every sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MetricSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Adds a feedback store.
    #[must_use]
    pub fn with_feedback_store(mut self, store: Arc<dyn FeedbackStore>) -> Self {
        self.feedback_stores.push(store);
        self
    }

    /// Starts the background dispatcher.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(self) -> Telemetry {
        let (sender, receiver) = mpsc::channel(self.capacity.get());
        tokio::spawn(run_dispatcher(receiver, self.sinks));
        Telemetry {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
            feedback_stores: self.feedback_stores.into(),
        }
    }
}

/// Handle to the telemetry dispatcher.
///
/// Emission never blocks the caller. When the queue is full the batch is
/// discarded and counted; see [`Telemetry::dropped`].
#[derive(Clone)]
pub struct Telemetry {
    sender: mpsc::Sender<Command>,
    dropped: Arc<AtomicU64>,
    feedback_stores: Arc<[Arc<dyn FeedbackStore>]>,
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("dropped", &self.dropped())
            .field("feedback_stores", &self.feedback_stores.len())
            .finish_non_exhaustive()
    }
}

impl Telemetry {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> TelemetryBuilder {
        TelemetryBuilder::default()
    }

    /// Queues a batch for delivery without waiting.
    pub fn emit(&self, batch: TelemetryBatch) {
        if batch.is_empty() {
            return;
        }
        match self.sender.try_send(Command::Emit(batch)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(dropped, "telemetry queue full; batch dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(dropped, "telemetry dispatcher stopped; batch dropped");
            }
        }
    }

    /// Number of batches discarded because the queue was full or closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Waits until every batch queued before this call has been delivered.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Closed`] when the dispatcher is gone.
    pub async fn flush(&self) -> TelemetryResult<()> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(Command::Flush(ack))
            .await
            .map_err(|_| TelemetryError::Closed)?;
        done.await.map_err(|_| TelemetryError::Closed)
    }

    /// Returns true when at least one feedback store is configured.
    #[must_use]
    pub fn feedback_enabled(&self) -> bool {
        !self.feedback_stores.is_empty()
    }

    /// Persists feedback to every configured store.
    ///
    /// All stores are attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::FeedbackDisabled`] when no store is
    /// configured, or the first store error.
    pub async fn record_feedback(&self, record: &FeedbackRecord) -> TelemetryResult<()> {
        if self.feedback_stores.is_empty() {
            return Err(TelemetryError::FeedbackDisabled);
        }
        let mut first_error = None;
        for store in self.feedback_stores.iter() {
            if let Err(err) = store.put_feedback(record).await {
                warn!(error = %err, "failed to store feedback");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => {
                debug!(
                    conversation_id = %record.conversation_id(),
                    rating = %record.rating(),
                    "feedback recorded"
                );
                Ok(())
            }
        }
    }
}

async fn run_dispatcher(mut receiver: mpsc::Receiver<Command>, sinks: Vec<Arc<dyn MetricSink>>) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Emit(batch) => deliver(&sinks, &batch).await,
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("telemetry dispatcher stopped");
}

async fn deliver(sinks: &[Arc<dyn MetricSink>], batch: &TelemetryBatch) {
    for sink in sinks {
        for metric in batch.metrics() {
            if let Err(err) = sink.put_metric(metric).await {
                warn!(sink = sink.name(), metric = metric.name(), error = %err, "metric sink failed");
            }
        }
        for property in batch.properties() {
            if let Err(err) = sink.put_property(&property.name, &property.value).await {
                warn!(sink = sink.name(), property = %property.name, error = %err, "metric sink failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use agent_primitives::{ConversationId, UpstreamError};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::feedback::FeedbackRating;
    use crate::metric::{Metric, MetricUnit};

    #[derive(Default)]
    struct RecordingSink {
        metrics: Mutex<Vec<(String, f64)>>,
        properties: Mutex<Vec<(String, String)>>,
        fail: bool,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl MetricSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn put_metric(&self, metric: &Metric) -> TelemetryResult<()> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(UpstreamError::unavailable("backend down").into());
            }
            self.metrics
                .lock()
                .unwrap()
                .push((metric.name().to_owned(), metric.value()));
            Ok(())
        }

        async fn put_property(&self, name: &str, value: &str) -> TelemetryResult<()> {
            if self.fail {
                return Err(UpstreamError::unavailable("backend down").into());
            }
            self.properties
                .lock()
                .unwrap()
                .push((name.to_owned(), value.to_owned()));
            Ok(())
        }
    }

    fn batch() -> TelemetryBatch {
        TelemetryBatch::new()
            .with_metric(Metric::new("LatencyMs", 12.5, MetricUnit::Milliseconds))
            .with_metric(Metric::count("OutputTokens", 7.0))
            .with_property("agentId", "agent-1")
    }

    #[tokio::test]
    async fn fans_out_to_every_sink_and_isolates_failures() {
        let failing = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let healthy = Arc::new(RecordingSink::default());
        let telemetry = Telemetry::builder()
            .with_sink(failing)
            .with_sink(healthy.clone())
            .spawn();

        telemetry.emit(batch());
        telemetry.flush().await.unwrap();

        assert_eq!(
            *healthy.metrics.lock().unwrap(),
            vec![("LatencyMs".to_owned(), 12.5), ("OutputTokens".to_owned(), 7.0)]
        );
        assert_eq!(
            *healthy.properties.lock().unwrap(),
            vec![("agentId".to_owned(), "agent-1".to_owned())]
        );
        assert_eq!(telemetry.dropped(), 0);
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        let gate = Arc::new(Notify::new());
        let sink = Arc::new(RecordingSink {
            gate: Some(Arc::clone(&gate)),
            ..RecordingSink::default()
        });
        let telemetry = Telemetry::builder()
            .queue_capacity(NonZeroUsize::new(1).unwrap())
            .with_sink(sink)
            .spawn();

        // The first batch is picked up by the worker, which then blocks on the gate.
        telemetry.emit(batch());
        tokio::task::yield_now().await;
        for _ in 0..5 {
            telemetry.emit(batch());
        }
        assert!(telemetry.dropped() >= 4);

        // Let the worker drain the outstanding deliveries.
        for _ in 0..4 {
            gate.notify_one();
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn empty_batch_is_ignored() {
        let telemetry = Telemetry::builder()
            .queue_capacity(NonZeroUsize::new(1).unwrap())
            .spawn();
        for _ in 0..3 {
            telemetry.emit(TelemetryBatch::new());
        }
        assert_eq!(telemetry.dropped(), 0);
    }

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<Vec<FeedbackRecord>>,
    }

    #[async_trait]
    impl FeedbackStore for MemoryStore {
        async fn put_feedback(&self, record: &FeedbackRecord) -> TelemetryResult<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn feedback_reaches_every_store() {
        let first = Arc::new(MemoryStore::default());
        let second = Arc::new(MemoryStore::default());
        let telemetry = Telemetry::builder()
            .with_feedback_store(first.clone())
            .with_feedback_store(second.clone())
            .spawn();

        let record = FeedbackRecord::new(
            ConversationId::new("conv-9").unwrap(),
            FeedbackRating::Positive,
            "useful",
        );
        telemetry.record_feedback(&record).await.unwrap();

        assert_eq!(first.records.lock().unwrap().len(), 1);
        assert_eq!(second.records.lock().unwrap()[0].notes(), "useful");
    }

    #[tokio::test]
    async fn feedback_without_store_is_reported() {
        let telemetry = Telemetry::builder().spawn();
        assert!(!telemetry.feedback_enabled());
        let record = FeedbackRecord::new(
            ConversationId::new("conv-9").unwrap(),
            FeedbackRating::Neutral,
            "",
        );
        let err = telemetry.record_feedback(&record).await.unwrap_err();
        assert!(matches!(err, TelemetryError::FeedbackDisabled));
    }
}
