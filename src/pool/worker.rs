//! Worker state machine
//!
//! Each worker runs until cancelled: wait for the gate, pull one item, scrape
//! it against the session the worker owns, and report the outcome. A failed
//! item goes back on the queue unchanged; the consumed delivery is settled
//! either way, so the drain condition stays truthful.
//!
//! Cancellation is observed at every suspension point. The cleanup block at
//! the bottom runs on every exit path: an in-flight item is requeued exactly
//! once, the session is released, and the registry entry removed, so a
//! worker never exits holding undeclared work.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::FailureKind;
use crate::gate::Gate;
use crate::queue::WorkQueue;
use crate::registry::WorkerRegistry;
use crate::scrape::Scraper;
use crate::types::{Event, WorkItem, WorkerId};

/// Everything a worker task needs, bundled for the spawn call
pub(crate) struct WorkerContext<S: Scraper> {
    pub(crate) id: WorkerId,
    pub(crate) scraper: Arc<S>,
    pub(crate) queue: Arc<WorkQueue>,
    pub(crate) gate: Arc<Gate>,
    pub(crate) registry: Arc<WorkerRegistry>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) cancel: CancellationToken,
}

/// Run one worker until cancellation
///
/// The caller must have registered `ctx.id` before spawning; this function
/// deregisters it on exit.
pub(crate) async fn run_worker<S: Scraper>(ctx: WorkerContext<S>) {
    info!(worker = %ctx.id, "worker started");
    ctx.event_tx.send(Event::WorkerStarted { worker: ctx.id }).ok();

    let mut session = match ctx.scraper.open_session().await {
        Ok(session) => session,
        Err(e) => {
            error!(worker = %ctx.id, error = %e, "failed to open scrape session, worker exiting");
            ctx.registry.deregister(&ctx.id);
            ctx.event_tx.send(Event::WorkerStopped { worker: ctx.id }).ok();
            return;
        }
    };

    let mut in_flight: Option<WorkItem> = None;

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = ctx.gate.wait() => {}
        }

        let item = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            item = ctx.queue.dequeue() => item,
        };
        in_flight = Some(item.clone());
        ctx.registry.mark_idle(&ctx.id);

        let outcome = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            outcome = ctx.scraper.scrape(&mut session, &item) => outcome,
        };

        match outcome {
            Ok(()) => {
                debug!(worker = %ctx.id, item = %item, "item scraped");
                ctx.registry.mark_completed(&ctx.id);
                ctx.event_tx
                    .send(Event::ItemCompleted {
                        item: item.clone(),
                        worker: ctx.id,
                    })
                    .ok();
            }
            Err(err) => {
                let kind = err.kind();
                match kind {
                    FailureKind::Recoverable => {
                        debug!(worker = %ctx.id, item = %item, "scrape timed out, requeueing");
                    }
                    FailureKind::Unknown => {
                        // Full detail; unclassified failures still count as a
                        // possible block signal
                        error!(
                            worker = %ctx.id,
                            item = %item,
                            error = %err,
                            "scrape failed with unclassified error, requeueing"
                        );
                    }
                }
                ctx.queue.enqueue(item.clone());
                ctx.registry.mark_failed(&ctx.id, kind);
                ctx.event_tx
                    .send(Event::ItemRequeued {
                        item: item.clone(),
                        worker: ctx.id,
                        kind,
                    })
                    .ok();
            }
        }

        // The dequeue is consumed on both paths; a requeue is a new delivery
        if let Err(e) = ctx.queue.settle(&item) {
            error!(worker = %ctx.id, error = %e, "delivery bookkeeping violation");
        }
        in_flight = None;
    }

    // Cleanup: runs on every exit path
    if let Some(item) = in_flight.take() {
        debug!(worker = %ctx.id, item = %item, "requeueing in-flight item during shutdown");
        ctx.queue.enqueue(item.clone());
        if let Err(e) = ctx.queue.settle(&item) {
            error!(worker = %ctx.id, error = %e, "delivery bookkeeping violation");
        }
    }

    ctx.scraper.close_session(session).await;
    ctx.registry.deregister(&ctx.id);
    ctx.event_tx.send(Event::WorkerStopped { worker: ctx.id }).ok();
    info!(worker = %ctx.id, "worker stopped");
}
