//! Run startup, drain wait, and teardown coordination.

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{ProgressReporter, RotationController, ScrapePool, WorkerContext, run_worker};
use crate::error::Result;
use crate::generator;
use crate::rotation::establish_identity;
use crate::scrape::Scraper;
use crate::types::{Event, JobSpec, RunReport, WorkerId};

impl<S: Scraper> ScrapePool<S> {
    /// Execute one job to completion
    ///
    /// Expands the job into its item sequence, establishes the initial
    /// network identity, spawns the workers, the rotation controller, and the
    /// progress reporter, then waits until every item is settled. Teardown
    /// cancels all tasks, awaits each acknowledged shutdown while suppressing
    /// errors raised purely during that phase, and disconnects the rotator.
    ///
    /// # Errors
    ///
    /// Run setup does not fail after construction; the `Result` covers future
    /// setup steps and keeps the signature stable for embedders.
    pub async fn run(&self, job: &JobSpec) -> Result<RunReport> {
        let items = generator::expand(job);
        let generated = items.len() as u64;
        info!(
            items = generated,
            workers = self.config.pool.workers,
            "starting scrape run"
        );

        for item in items {
            self.queue.enqueue(item);
        }

        // No worker may issue a request before the first identity is up
        establish_identity(self.rotator.as_ref(), &self.config.rotation).await;

        let shutdown = tokio_util::sync::CancellationToken::new();
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        // Subscribed before any worker spawns so no completion is missed
        let reporter_events = self.event_tx.subscribe();

        for _ in 0..self.config.pool.workers {
            let id = WorkerId::new();
            // Registered before spawn so the registry never undercounts
            self.registry.register(id);
            let ctx = WorkerContext {
                id,
                scraper: self.scraper.clone(),
                queue: self.queue.clone(),
                gate: self.gate.clone(),
                registry: self.registry.clone(),
                event_tx: self.event_tx.clone(),
                cancel: shutdown.child_token(),
            };
            handles.push(tokio::spawn(run_worker(ctx)));
        }

        let controller = RotationController {
            config: self.config.clone(),
            queue: self.queue.clone(),
            gate: self.gate.clone(),
            registry: self.registry.clone(),
            rotator: self.rotator.clone(),
            event_tx: self.event_tx.clone(),
            cancel: shutdown.child_token(),
        };
        handles.push(tokio::spawn(controller.run()));

        let reporter = ProgressReporter {
            total: generated,
            events: reporter_events,
            cancel: shutdown.child_token(),
        };
        handles.push(tokio::spawn(reporter.run()));

        self.queue.drain_wait().await;
        self.emit_event(Event::Drained);
        info!("work queue drained, tearing down");

        shutdown.cancel();
        for handle in handles {
            // Errors raised purely during teardown are suppressed
            let _ = handle.await;
        }

        if let Err(e) = self.rotator.disconnect().await {
            warn!(error = %e, "failed to disconnect network identity during teardown");
        }

        self.emit_event(Event::Shutdown);

        let stats = self.queue.stats();
        info!(
            delivered = stats.delivered,
            settled = stats.settled,
            "scrape run complete"
        );
        Ok(RunReport {
            generated,
            delivered: stats.delivered,
            settled: stats.settled,
        })
    }
}
