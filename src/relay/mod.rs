//! Log relay: filters host log records and forwards them in timed batches.
//!
//! Record path: origin filter → mode policy → importance classifier →
//! `[LEVEL] message` line → [`BatchQueue`]. The [`Dispatcher`] drains the
//! queue on its own Tokio task, so a slow or failing transport never blocks
//! the thread that emitted the log.
//!
//! [`LogRelay`] owns the queue and the mode/destination snapshot; the
//! dispatcher only drains and reads.

pub mod classifier;
pub mod dispatcher;
pub mod mode;
pub mod origin;
pub mod queue;
pub mod record;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{
    ConfigStore, ConfigValue, RelaySettings, StoreError, KEY_ADMIN_IDS, KEY_ENABLE_SERVER_LOGS,
    KEY_LOG_MODE,
};
use crate::notifier::Notifier;

pub use self::classifier::ImportantKeywords;
pub use self::dispatcher::{
    AdminDestinations, Dispatcher, DispatcherHandle, SkipReason, StopOutcome, TickOutcome,
};
pub use self::mode::LogMode;
pub use self::queue::BatchQueue;
pub use self::record::LogRecord;

use self::mode::ModeCell;
use self::origin::NOTIFIER_TARGET;

/// Errors from relay lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// `start` was called outside a Tokio runtime.
    #[error("log relay must be started from within a Tokio runtime")]
    NoRuntime,
}

/// What [`LogRelay::on_record`] did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Formatted and queued.
    Queued,
    /// Dropped because the mode is disabled.
    Disabled,
    /// Dropped because it came from the notification path.
    Internal,
    /// Dropped by the importance filter in `important_only` mode.
    NotImportant,
}

/// Result of [`LogRelay::drain_pending`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Batches fanned out.
    pub batches: usize,
    /// Lines drained across all batches.
    pub lines: usize,
    /// Lines still queued when draining ended.
    pub remaining: usize,
    /// Whether the deadline cut draining short.
    pub timed_out: bool,
}

/// Snapshot of the runtime switches loaded from the config store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySnapshot {
    /// Effective capture mode.
    pub mode: LogMode,
    /// Destination chat IDs.
    pub destinations: Vec<i64>,
}

/// Entry point for host log records and owner of the batching pipeline.
pub struct LogRelay {
    store: Arc<dyn ConfigStore>,
    notifier: Arc<dyn Notifier>,
    settings: RelaySettings,
    keywords: ImportantKeywords,
    queue: Arc<BatchQueue>,
    mode: Arc<ModeCell>,
    destinations: Arc<AdminDestinations>,
    attached: AtomicBool,
    dispatcher: Mutex<Option<DispatcherHandle>>,
    // Serializes mode switches so the stored mode and enable flag agree.
    mode_write: Mutex<()>,
}

impl std::fmt::Debug for LogRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogRelay")
            .field("mode", &self.mode())
            .field("pending", &self.queue.len())
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

impl LogRelay {
    /// Create a relay and load its switches from `store`.
    ///
    /// The relay is detached until [`LogRelay::start`] is called.
    pub fn new(
        store: Arc<dyn ConfigStore>,
        notifier: Arc<dyn Notifier>,
        settings: RelaySettings,
    ) -> Self {
        let keywords = ImportantKeywords::new(&settings.important_keywords);
        let relay = Self {
            store,
            notifier,
            keywords,
            queue: Arc::new(BatchQueue::with_capacity(settings.queue_capacity())),
            mode: Arc::new(ModeCell::default()),
            destinations: Arc::new(AdminDestinations::default()),
            attached: AtomicBool::new(false),
            dispatcher: Mutex::new(None),
            mode_write: Mutex::new(()),
            settings,
        };
        relay.load_config();
        relay
    }

    /// Filter, format and queue one host record.
    ///
    /// Never blocks on I/O; safe to call from any number of threads.
    pub fn on_record(&self, record: &LogRecord) -> RecordOutcome {
        let mode = self.mode.get();
        if !mode.is_enabled() {
            return RecordOutcome::Disabled;
        }

        let message = record.message.as_deref();
        if origin::is_internal(record.logger_name.as_deref(), message) {
            return RecordOutcome::Internal;
        }

        if mode == LogMode::ImportantOnly && !self.keywords.is_important(message) {
            return RecordOutcome::NotImportant;
        }

        self.queue.enqueue(record.format_line());
        RecordOutcome::Queued
    }

    /// Re-read mode and destinations from the config store.
    ///
    /// Never fails: an unrecognised mode falls back to `IMPORTANT_ONLY` and a
    /// missing destination list to none. `enable_server_logs = false` forces
    /// the mode to `DISABLED`.
    pub fn load_config(&self) -> RelaySnapshot {
        let snapshot = load_snapshot(self.store.as_ref());
        self.mode.replace(snapshot.mode);
        self.destinations.replace(snapshot.destinations.clone());
        debug!(
            mode = %snapshot.mode,
            destinations = snapshot.destinations.len(),
            "relay config loaded"
        );
        snapshot
    }

    /// Switch mode and persist both the mode and the derived enable flag.
    ///
    /// The in-memory mode changes even if persisting fails. Concurrent calls
    /// run one at a time, so the stored mode and flag always come from the
    /// same call.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write or cannot save.
    pub fn set_mode(&self, mode: LogMode) -> Result<(), StoreError> {
        let _guard = self.mode_write.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self.mode.replace(mode);
        persist_mode(self.store.as_ref(), mode)?;
        info!(from = %previous, to = %mode, "relay mode changed");
        Ok(())
    }

    /// Re-read the backing store from durable storage, then apply it.
    ///
    /// Used when another process (e.g. `courier mode`) rewrote the config.
    /// Held against concurrent [`LogRelay::set_mode`] calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be re-read; the current snapshot
    /// is kept in that case.
    pub fn reload_config(&self) -> Result<RelaySnapshot, StoreError> {
        let _guard = self.mode_write.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.reload()?;
        Ok(self.load_config())
    }

    /// Current capture mode.
    pub fn mode(&self) -> LogMode {
        self.mode.get()
    }

    /// Whether any capture happens (`mode != DISABLED`).
    pub fn is_logs_enabled(&self) -> bool {
        self.mode.get().is_enabled()
    }

    /// Current destination snapshot.
    pub fn destinations(&self) -> Arc<[i64]> {
        self.destinations.snapshot()
    }

    /// The relay's queue.
    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    /// Static settings the relay was built with.
    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Build a dispatcher over this relay's shared state.
    ///
    /// Useful for driving a flush manually; [`LogRelay::start`] spawns one.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.mode),
            Arc::clone(&self.destinations),
            Arc::clone(&self.notifier),
            self.settings.batch_size,
        )
    }

    /// Attach to the host log stream and start the periodic dispatcher.
    ///
    /// Idempotent: a running relay is left as is.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NoRuntime`] outside a Tokio runtime.
    pub fn start(&self) -> Result<(), RelayError> {
        let mut slot = self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Ok(());
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(RelayError::NoRuntime);
        }

        let handle = self
            .dispatcher()
            .spawn(self.settings.flush_interval(), self.settings.shutdown_grace());
        *slot = Some(handle);
        self.attached.store(true, Ordering::Release);
        info!(
            interval_secs = self.settings.flush_interval().as_secs(),
            batch_size = self.settings.batch_size,
            "relay started"
        );
        Ok(())
    }

    /// Detach from the host log stream and stop the dispatcher.
    ///
    /// Waits up to the configured grace period for an in-flight tick. Returns
    /// `None` if the relay was not running. Idempotent.
    pub async fn stop(&self) -> Option<StopOutcome> {
        self.attached.store(false, Ordering::Release);
        let handle = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        let outcome = handle.stop().await;
        info!(?outcome, pending = self.queue.len(), "relay stopped");
        Some(outcome)
    }

    /// Detach and abort the dispatcher without waiting.
    ///
    /// For synchronous teardown paths; prefer [`LogRelay::stop`].
    pub fn close(&self) {
        self.attached.store(false, Ordering::Release);
        let handle = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(handle);
    }

    /// No-op: batches are flushed only by the dispatcher timer.
    pub fn flush(&self) {}

    /// Dispatch queued lines batch by batch until the queue is empty, a tick
    /// is skipped, or `deadline` passes.
    ///
    /// For end-of-input shutdown, after [`LogRelay::stop`]. A batch cut off
    /// by the deadline is lost like any in-flight batch.
    pub async fn drain_pending(&self, deadline: Duration) -> DrainReport {
        let dispatcher = self.dispatcher();
        let mut report = DrainReport::default();

        let drained = tokio::time::timeout(deadline, async {
            while let TickOutcome::Dispatched { lines, .. } = dispatcher.tick().await {
                report.batches = report.batches.saturating_add(1);
                report.lines = report.lines.saturating_add(lines);
            }
        })
        .await;

        report.timed_out = drained.is_err();
        report.remaining = self.queue.len();
        debug!(
            target: NOTIFIER_TARGET,
            batches = report.batches,
            lines = report.lines,
            remaining = report.remaining,
            timed_out = report.timed_out,
            "pending lines drained"
        );
        report
    }

    /// Send `text` with a visible notification to every destination.
    ///
    /// Returns how many destinations accepted it. Failures are logged and
    /// skipped.
    pub async fn notify_admins(&self, text: &str) -> usize {
        let mut delivered: usize = 0;
        for &destination in self.destinations().iter() {
            match self.notifier.send(destination, text).await {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(e) => warn!(
                    target: NOTIFIER_TARGET,
                    destination,
                    error = %e,
                    "failed to send telegram message"
                ),
            }
        }
        delivered
    }

    /// Whether host records are currently being fed to the relay.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

/// Write `mode` and its derived enable flag, then save the store.
///
/// # Errors
///
/// Returns an error if the store rejects the write or cannot save.
pub fn persist_mode(store: &dyn ConfigStore, mode: LogMode) -> Result<(), StoreError> {
    store.set(KEY_LOG_MODE, ConfigValue::String(mode.as_str().to_owned()))?;
    store.set(KEY_ENABLE_SERVER_LOGS, ConfigValue::Bool(mode.is_enabled()))?;
    store.save()
}

/// Derive the effective mode and destinations from the store.
pub fn load_snapshot(store: &dyn ConfigStore) -> RelaySnapshot {
    let raw_mode = store.get_string(KEY_LOG_MODE, LogMode::default().as_str());
    let parsed = match raw_mode.parse::<LogMode>() {
        Ok(mode) => mode,
        Err(e) => {
            debug!(error = %e, "falling back to default log mode");
            LogMode::default()
        }
    };

    let mode = if store.get_bool(KEY_ENABLE_SERVER_LOGS, true) {
        parsed
    } else {
        LogMode::Disabled
    };

    RelaySnapshot {
        mode,
        destinations: store.get_i64_list(KEY_ADMIN_IDS),
    }
}
