//! Shared worker outcome registry
//!
//! One entry per live worker task, owned by the pool and shared by handle
//! with the rotation controller and every worker. The registry also counts
//! failure events: each requeue increments an unclaimed-failure counter the
//! controller drains once per scan, so a single failure decrements the
//! pool's liveness credit exactly once regardless of scan timing.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::FailureKind;
use crate::types::WorkerId;

/// Per-worker outcome entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerRecord {
    /// Whether the worker's most recent attempt completed successfully
    pub completed: bool,
    /// Classification of the most recent failure, if any
    pub last_error: Option<FailureKind>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    workers: HashMap<WorkerId, WorkerRecord>,
    unclaimed_failures: u64,
}

/// Registry of live workers and their most recent outcomes
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    inner: Mutex<RegistryInner>,
}

impl WorkerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry for a newly spawned worker
    pub fn register(&self, id: WorkerId) {
        self.lock_inner().workers.insert(id, WorkerRecord::default());
    }

    /// Remove a terminating worker's entry
    pub fn deregister(&self, id: &WorkerId) {
        self.lock_inner().workers.remove(id);
    }

    /// Clear a worker's outcome before it starts a fresh attempt
    pub fn mark_idle(&self, id: &WorkerId) {
        if let Some(record) = self.lock_inner().workers.get_mut(id) {
            *record = WorkerRecord::default();
        }
    }

    /// Record a successful attempt
    pub fn mark_completed(&self, id: &WorkerId) {
        if let Some(record) = self.lock_inner().workers.get_mut(id) {
            record.completed = true;
            record.last_error = None;
        }
    }

    /// Record a failed attempt and count one failure event
    pub fn mark_failed(&self, id: &WorkerId, kind: FailureKind) {
        let mut inner = self.lock_inner();
        if let Some(record) = inner.workers.get_mut(id) {
            record.completed = false;
            record.last_error = Some(kind);
        }
        inner.unclaimed_failures += 1;
    }

    /// Number of currently registered workers
    pub fn worker_count(&self) -> usize {
        self.lock_inner().workers.len()
    }

    /// Drain the failure events recorded since the last call
    pub fn take_failure_count(&self) -> u64 {
        let mut inner = self.lock_inner();
        std::mem::take(&mut inner.unclaimed_failures)
    }

    /// Begin a fresh rotation round
    ///
    /// Discards failure events from the previous identity and returns the
    /// live worker count the new threshold derives from.
    pub fn start_round(&self) -> usize {
        let mut inner = self.lock_inner();
        inner.unclaimed_failures = 0;
        inner.workers.len()
    }

    /// Snapshot of a worker's record, if registered
    pub fn record(&self, id: &WorkerId) -> Option<WorkerRecord> {
        self.lock_inner().workers.get(id).copied()
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
