//! FIFO buffer of formatted lines awaiting dispatch.
//!
//! Producers append from any thread; the dispatcher drains. A single mutex
//! guards the deque, so each enqueue is atomic with respect to every other
//! enqueue and drain, and a removed line can never be handed out twice.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Concurrency-safe ordered queue of log lines.
///
/// Unbounded by default. With a capacity, pushing onto a full queue evicts
/// the oldest line and counts it in [`BatchQueue::dropped`].
#[derive(Debug, Default)]
pub struct BatchQueue {
    lines: Mutex<VecDeque<String>>,
    capacity: Option<usize>,
    dropped: AtomicU64,
}

impl BatchQueue {
    /// Create an unbounded queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue holding at most `capacity` lines (drop-oldest).
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    /// Create a queue from an optional bound.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(cap) => Self::bounded(cap),
            None => Self::new(),
        }
    }

    /// Append a line.
    pub fn enqueue(&self, line: String) {
        let mut lines = self.lock();
        if let Some(cap) = self.capacity {
            while lines.len() >= cap {
                if lines.pop_front().is_none() {
                    break;
                }
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        lines.push_back(line);
    }

    /// Remove and return up to `max` of the oldest lines, in order.
    pub fn drain_up_to(&self, max: usize) -> Vec<String> {
        let mut lines = self.lock();
        let take = max.min(lines.len());
        lines.drain(..take).collect()
    }

    /// Number of queued lines.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Lines evicted because the bound was reached.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    // A producer that panicked mid-push cannot leave the deque half-written,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
