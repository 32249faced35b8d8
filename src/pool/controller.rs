//! Identity rotation controller
//!
//! Decides when the pool's network identity is exhausted, rotates it exactly
//! once, and gates worker progress around the rotation. In the healthy phase
//! the gate is never left open: every scan releases the pool for a single
//! dequeue round, so at most one round elapses per liveness check. Once the
//! liveness credit drops below the threshold the gate stays shut, the queue
//! quiesces, and a fresh identity is acquired with unbounded retry.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::gate::Gate;
use crate::queue::WorkQueue;
use crate::registry::WorkerRegistry;
use crate::rotation::{IdentityRotator, establish_identity};
use crate::types::Event;

/// Number of failure events the pool tolerates before rotating:
/// `ceil(worker_count × failure_ratio)` is the floor the liveness credit
/// must stay at or above
pub(crate) fn rotation_threshold(worker_count: usize, failure_ratio: f64) -> i64 {
    (worker_count as f64 * failure_ratio).ceil() as i64
}

/// Controller task governing the gate and the rotation collaborator
pub(crate) struct RotationController {
    pub(crate) config: Arc<Config>,
    pub(crate) queue: Arc<WorkQueue>,
    pub(crate) gate: Arc<Gate>,
    pub(crate) registry: Arc<WorkerRegistry>,
    pub(crate) rotator: Arc<dyn IdentityRotator>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) cancel: CancellationToken,
}

impl RotationController {
    /// Run until cancelled
    pub(crate) async fn run(self) {
        info!("rotation controller started");
        let poll = self.config.pool.poll_interval;
        let ratio = self.config.pool.failure_ratio;

        loop {
            // Reset point: liveness credit and threshold derive from the
            // workers alive right now; failure events from before this
            // moment belong to the previous identity
            let worker_count = self.registry.start_round();
            let threshold = rotation_threshold(worker_count, ratio);
            let mut live = worker_count as i64;
            debug!(live, threshold, "rotation round started");

            while live >= threshold {
                // One dequeue round per scan
                self.gate.pulse();
                live -= self.registry.take_failure_count() as i64;

                if !self.sleep_or_cancel(poll).await {
                    return;
                }
            }

            info!(
                live,
                threshold, "failure threshold crossed, pausing pool for identity rotation"
            );
            self.event_tx
                .send(Event::RotationStarted { live, threshold })
                .ok();

            // Quiesce: with the gate shut, wait for every held delivery to
            // settle so no request runs under the stale identity
            while self.queue.stats().in_flight() > 0 {
                if !self.sleep_or_cancel(poll).await {
                    return;
                }
            }

            let location = tokio::select! {
                _ = self.cancel.cancelled() => return,
                location = establish_identity(self.rotator.as_ref(), &self.config.rotation) => location,
            };

            let next_count = self.registry.worker_count();
            self.event_tx
                .send(Event::RotationCompleted {
                    location,
                    live: next_count as i64,
                    threshold: rotation_threshold(next_count, ratio),
                })
                .ok();
            // The next round's first pulse releases everyone blocked through
            // the rotation in a single scheduling round
        }
    }

    /// Sleep for `duration`; returns false when cancelled instead
    async fn sleep_or_cancel(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
