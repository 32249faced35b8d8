//! Work queue with delivery and settlement tracking
//!
//! An unbounded in-memory queue with the bookkeeping the orchestration layer
//! is built on: an item is *delivered* when a worker dequeues it and *settled*
//! when that worker explicitly marks the delivery done. Requeueing a failed
//! item is a fresh enqueue; the consumed delivery is settled separately, so
//! the drain condition (everything settled, nothing pending) holds exactly
//! when no work remains anywhere in the pipeline.
//!
//! The internal mutex is never held across an await; wakeups go through two
//! [`Notify`] instances whose futures are enabled before the state check, so
//! a notification landing between check and sleep is never lost.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::error::QueueError;
use crate::types::{QueueStats, WorkItem};

#[derive(Debug, Default)]
struct QueueInner {
    items: VecDeque<WorkItem>,
    delivered: u64,
    settled: u64,
}

/// Unbounded work queue shared by the pool
///
/// Duplicates are allowed: an item requeued after a partially-successful
/// attempt can coexist with records already persisted for it, so the
/// downstream sink must tolerate duplicate records.
#[derive(Debug, Default)]
pub struct WorkQueue {
    inner: Mutex<QueueInner>,
    item_available: Notify,
    drained: Notify,
}

impl WorkQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item to the back of the queue
    ///
    /// Non-blocking and safe to call concurrently, including re-enqueue by
    /// any worker.
    pub fn enqueue(&self, item: WorkItem) {
        {
            let mut inner = self.lock_inner();
            inner.items.push_back(item);
        }
        self.item_available.notify_one();
    }

    /// Take the next item, suspending while the queue is empty
    ///
    /// The returned item counts as delivered until [`settle`](Self::settle)
    /// is called for it.
    pub async fn dequeue(&self) -> WorkItem {
        loop {
            let notified = self.item_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock_inner();
                if let Some(item) = inner.items.pop_front() {
                    inner.delivered += 1;
                    return item;
                }
            }

            notified.await;
        }
    }

    /// Mark one previously delivered item done
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::SettleWithoutDelivery`] if no delivery is
    /// outstanding; settling the same delivery twice is a caller bug.
    pub fn settle(&self, item: &WorkItem) -> Result<(), QueueError> {
        let drained = {
            let mut inner = self.lock_inner();
            if inner.settled >= inner.delivered {
                return Err(QueueError::SettleWithoutDelivery {
                    document_id: item.document_id.clone(),
                    year: item.year.clone(),
                });
            }
            inner.settled += 1;
            inner.items.is_empty() && inner.settled == inner.delivered
        };

        if drained {
            self.drained.notify_waiters();
        }
        Ok(())
    }

    /// Suspend until every delivered item is settled and the store is empty
    ///
    /// Resolves immediately on an empty, idle queue. Items merely delivered
    /// do not count; only settlement drains the queue.
    pub async fn drain_wait(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let inner = self.lock_inner();
                if inner.items.is_empty() && inner.settled == inner.delivered {
                    return;
                }
            }

            notified.await;
        }
    }

    /// Current counters
    pub fn stats(&self) -> QueueStats {
        let inner = self.lock_inner();
        QueueStats {
            pending: inner.items.len() as u64,
            delivered: inner.delivered,
            settled: inner.settled,
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        // A poisoned lock means a panic while holding it; the bookkeeping is
        // still internally consistent, so keep going with the inner value.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
