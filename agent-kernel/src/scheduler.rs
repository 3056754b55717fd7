//! Bounded scheduler for concurrent turns.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default bound on turns running at once.
pub const DEFAULT_MAX_CONCURRENT_TURNS: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(value) => value,
    None => unreachable!(),
};

/// Maximum number of turns allowed to run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    max_concurrent_turns: NonZeroUsize,
}

impl SchedulerConfig {
    /// Creates a configuration with the supplied limit.
    #[must_use]
    pub const fn new(max_concurrent_turns: NonZeroUsize) -> Self {
        Self {
            max_concurrent_turns,
        }
    }

    /// Returns the configured limit.
    #[must_use]
    pub const fn max_concurrent_turns(self) -> NonZeroUsize {
        self.max_concurrent_turns
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_TURNS)
    }
}

/// Wrapper around `tokio::spawn` that caps the number of turns in flight.
///
/// Tasks beyond the limit are spawned immediately but wait for a permit
/// before running.
#[derive(Debug, Clone)]
pub struct TurnScheduler {
    semaphore: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
    config: SchedulerConfig,
}

impl TurnScheduler {
    /// Constructs a scheduler using the provided configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let permits = config.max_concurrent_turns().get();
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            closed: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Returns the associated configuration.
    #[must_use]
    pub const fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Returns `true` if the scheduler has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the scheduler. New submissions are rejected and tasks still
    /// waiting for a permit resolve to [`SchedulerError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.semaphore.close();
        debug!("turn scheduler closed");
    }

    /// Spawns a future once a permit is available.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Closed`] when the scheduler is closed before
    /// the task is enqueued. The task itself yields the same error when the
    /// scheduler closes while it waits for a permit.
    pub fn spawn<F, T>(&self, future: F) -> SchedulerResult<JoinHandle<SchedulerResult<T>>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }

        let semaphore = Arc::clone(&self.semaphore);

        let handle = tokio::spawn(async move {
            let Ok(permit) = semaphore.acquire_owned().await else {
                return Err(SchedulerError::Closed);
            };
            let output = future.await;
            drop(permit);
            Ok(output)
        });

        Ok(handle)
    }
}

impl Default for TurnScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

/// Errors produced by the scheduler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// Scheduler is closed and will not accept new turns.
    #[error("turn scheduler closed")]
    Closed,
}

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
