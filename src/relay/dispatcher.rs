//! Timed batch flushing to every admin destination.
//!
//! A [`Dispatcher`] drains up to `batch_size` lines per tick, joins them
//! with newlines, and sends the body silently to all destinations at once. Delivery
//! is best-effort: a drained line is consumed whether or not any send
//! succeeds, and a failure for one destination does not affect the others.
//!
//! [`Dispatcher::spawn`] runs ticks on a Tokio interval until the returned
//! [`DispatcherHandle`] is stopped or dropped.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::notifier::Notifier;

use super::mode::ModeCell;
use super::origin::NOTIFIER_TARGET;
use super::queue::BatchQueue;

/// Ordered set of destination chat IDs, replaced wholesale on reload.
#[derive(Debug, Default)]
pub struct AdminDestinations {
    ids: RwLock<Arc<[i64]>>,
}

impl AdminDestinations {
    /// Create a set from `ids`, dropping duplicates but keeping first-seen order.
    pub fn new(ids: Vec<i64>) -> Self {
        let set = Self::default();
        set.replace(ids);
        set
    }

    /// Current destinations. The returned slice is an immutable snapshot.
    pub fn snapshot(&self) -> Arc<[i64]> {
        Arc::clone(&self.ids.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace every destination at once.
    pub fn replace(&self, ids: Vec<i64>) {
        let mut unique: Vec<i64> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        *self.ids.write().unwrap_or_else(PoisonError::into_inner) = unique.into();
    }
}

/// Why a tick did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The relay mode is disabled.
    Disabled,
    /// No destinations are configured.
    NoDestinations,
    /// Nothing is queued.
    EmptyQueue,
}

/// Result of a single dispatcher tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was drained or sent.
    Skipped(SkipReason),
    /// A batch was drained and fanned out.
    Dispatched {
        /// Lines drained into the batch.
        lines: usize,
        /// Destinations that accepted the batch.
        delivered: usize,
        /// Destinations whose send failed.
        failed: usize,
    },
}

/// How a running dispatcher ended on stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The loop observed the shutdown signal within the grace period.
    Graceful,
    /// An in-flight tick overran the grace period and was aborted.
    Aborted,
    /// The task had already terminated abnormally (panic).
    Failed,
}

/// Drains the queue and forwards batches through a [`Notifier`].
#[derive(Clone)]
pub struct Dispatcher {
    queue: Arc<BatchQueue>,
    mode: Arc<ModeCell>,
    destinations: Arc<AdminDestinations>,
    notifier: Arc<dyn Notifier>,
    batch_size: usize,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("batch_size", &self.batch_size)
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher over shared relay state.
    pub fn new(
        queue: Arc<BatchQueue>,
        mode: Arc<ModeCell>,
        destinations: Arc<AdminDestinations>,
        notifier: Arc<dyn Notifier>,
        batch_size: usize,
    ) -> Self {
        Self {
            queue,
            mode,
            destinations,
            notifier,
            batch_size: batch_size.max(1),
        }
    }

    /// Run one flush cycle.
    pub async fn tick(&self) -> TickOutcome {
        if !self.mode.get().is_enabled() {
            return TickOutcome::Skipped(SkipReason::Disabled);
        }
        if self.queue.is_empty() {
            return TickOutcome::Skipped(SkipReason::EmptyQueue);
        }
        let destinations = self.destinations.snapshot();
        if destinations.is_empty() {
            return TickOutcome::Skipped(SkipReason::NoDestinations);
        }

        let batch = self.queue.drain_up_to(self.batch_size);
        if batch.is_empty() {
            return TickOutcome::Skipped(SkipReason::EmptyQueue);
        }
        let body: Arc<str> = batch.join("\n").into();

        // Destinations are sent to concurrently; a slow chat does not hold
        // up the rest. Dropping the set (on abort) cancels every send.
        let mut sends = JoinSet::new();
        for &destination in destinations.iter() {
            let notifier = Arc::clone(&self.notifier);
            let body = Arc::clone(&body);
            sends.spawn(async move {
                let result = notifier.send_silent(destination, &body).await;
                (destination, result)
            });
        }

        let mut delivered: usize = 0;
        let mut failed: usize = 0;
        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((_, Ok(()))) => delivered = delivered.saturating_add(1),
                Ok((destination, Err(e))) => {
                    failed = failed.saturating_add(1);
                    warn!(
                        target: NOTIFIER_TARGET,
                        destination,
                        error = %e,
                        "failed to deliver log batch"
                    );
                }
                Err(e) => {
                    failed = failed.saturating_add(1);
                    warn!(target: NOTIFIER_TARGET, error = %e, "failed to deliver log batch");
                }
            }
        }

        debug!(
            target: NOTIFIER_TARGET,
            lines = batch.len(),
            delivered,
            failed,
            "log batch dispatched"
        );

        TickOutcome::Dispatched {
            lines: batch.len(),
            delivered,
            failed,
        }
    }

    /// Start ticking every `period`, after an initial delay of one period.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self, period: Duration, grace: Duration) -> DispatcherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(period, shutdown_rx));
        DispatcherHandle {
            shutdown_tx,
            task: Some(task),
            grace,
        }
    }

    async fn run(self, period: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first immediate tick so the first flush waits one period.
        interval.tick().await;
        debug!(
            target: NOTIFIER_TARGET,
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "dispatcher started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        debug!(target: NOTIFIER_TARGET, "dispatcher stopped");
    }
}

/// Owns a spawned dispatcher task.
///
/// Dropping the handle without calling [`DispatcherHandle::stop`] aborts the
/// task immediately, so the timer never outlives its owner.
#[derive(Debug)]
pub struct DispatcherHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    grace: Duration,
}

impl DispatcherHandle {
    /// Signal shutdown and wait up to the grace period for the task to exit.
    ///
    /// A tick still running after the grace period is aborted; the batch it
    /// had drained is lost.
    pub async fn stop(mut self) -> StopOutcome {
        let Some(mut task) = self.task.take() else {
            return StopOutcome::Graceful;
        };
        // The receiver is gone only if the task already exited.
        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(self.grace, &mut task).await {
            Ok(Ok(())) => StopOutcome::Graceful,
            Ok(Err(e)) => {
                warn!(target: NOTIFIER_TARGET, error = %e, "dispatcher task failed");
                StopOutcome::Failed
            }
            Err(_) => {
                task.abort();
                if let Err(e) = task.await {
                    if !e.is_cancelled() {
                        warn!(target: NOTIFIER_TARGET, error = %e, "dispatcher task failed");
                    }
                }
                warn!(
                    target: NOTIFIER_TARGET,
                    grace_ms = u64::try_from(self.grace.as_millis()).unwrap_or(u64::MAX),
                    "dispatcher tick overran shutdown grace period, aborted"
                );
                StopOutcome::Aborted
            }
        }
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = self.shutdown_tx.send(true);
            task.abort();
        }
    }
}
