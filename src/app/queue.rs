// LogTrail - app/queue.rs
//
// Pending-entry queue shared by the tailing worker (producer) and the
// dispatcher (consumer). One mutex guards it; the lock is held only for the
// queue operation itself, never across file or sink I/O.

use crate::core::model::LogEntry;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Ordered, unbounded, thread-safe queue of decoded entries.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    inner: Arc<Mutex<VecDeque<LogEntry>>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic while holding the lock leaves the queue itself intact, so a
    /// poisoned lock is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Pending queue lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Append entries at the back, preserving their order.
    pub fn push_all(&self, entries: Vec<LogEntry>) {
        if entries.is_empty() {
            return;
        }
        self.lock().extend(entries);
    }

    /// Remove and return everything queued, in order.
    pub fn drain(&self) -> Vec<LogEntry> {
        self.lock().drain(..).collect()
    }

    /// Put a batch back at the front so it is delivered before anything
    /// queued since it was drained.
    pub fn requeue_front(&self, batch: Vec<LogEntry>) {
        let mut queue = self.lock();
        for entry in batch.into_iter().rev() {
            queue.push_front(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop everything queued. Returns how many entries were discarded.
    pub fn clear(&self) -> usize {
        let mut queue = self.lock();
        let n = queue.len();
        queue.clear();
        n
    }
}
