//! Worker pool orchestration split into focused submodules.
//!
//! The `ScrapePool` struct and its collaborator tasks are organized by role:
//! - [`worker`] - Worker state machine (gate wait, dequeue, scrape, settle)
//! - [`controller`] - Identity rotation controller governing the gate
//! - [`progress`] - Progress reporting off the event stream
//! - [`lifecycle`] - Run startup, drain wait, and teardown coordination

mod controller;
mod lifecycle;
mod progress;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub(crate) use controller::RotationController;
pub(crate) use progress::ProgressReporter;
pub(crate) use worker::{WorkerContext, run_worker};

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::error::Result;
use crate::gate::Gate;
use crate::queue::WorkQueue;
use crate::registry::WorkerRegistry;
use crate::rotation::IdentityRotator;
use crate::scrape::Scraper;
use crate::types::{Event, QueueStats};

/// The worker pool: queue, gate, registry, and every task that runs over them
///
/// Generic over the scrape collaborator; the rotator is a trait object since
/// only one rotation can be in flight at a time anyway.
pub struct ScrapePool<S: Scraper> {
    pub(crate) config: Arc<Config>,
    pub(crate) scraper: Arc<S>,
    pub(crate) rotator: Arc<dyn IdentityRotator>,
    pub(crate) queue: Arc<WorkQueue>,
    pub(crate) gate: Arc<Gate>,
    pub(crate) registry: Arc<WorkerRegistry>,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl<S: Scraper> ScrapePool<S> {
    /// Create a pool from its configuration and collaborators
    ///
    /// # Errors
    ///
    /// Returns a configuration error when validation fails (zero workers,
    /// out-of-range failure ratio).
    pub fn new(config: Config, scraper: S, rotator: Arc<dyn IdentityRotator>) -> Result<Self> {
        config.validate()?;

        // Buffered so slow subscribers lag instead of stalling workers
        let (event_tx, _rx) = broadcast::channel(1024);

        Ok(Self {
            config: Arc::new(config),
            scraper: Arc::new(scraper),
            rotator,
            queue: Arc::new(WorkQueue::new()),
            gate: Arc::new(Gate::new()),
            registry: Arc::new(WorkerRegistry::new()),
            event_tx,
        })
    }

    /// Subscribe to pool lifecycle events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. A subscriber that falls more than the channel buffer
    /// behind receives a `Lagged` error and skips ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current queue counters
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped; the
    /// pipeline never depends on anyone listening.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
