use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::FailureKind;
use crate::gate::Gate;
use crate::pool::test_helpers::{MockOutcome, MockScraper};
use crate::pool::{WorkerContext, run_worker};
use crate::queue::WorkQueue;
use crate::registry::WorkerRegistry;
use crate::types::{Event, WorkItem, WorkerId};

/// One worker wired to fresh shared state
struct Harness {
    queue: Arc<WorkQueue>,
    gate: Arc<Gate>,
    registry: Arc<WorkerRegistry>,
    scraper: Arc<MockScraper>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
    id: WorkerId,
}

impl Harness {
    fn new() -> Self {
        let (event_tx, _rx) = broadcast::channel(256);
        Self {
            queue: Arc::new(WorkQueue::new()),
            gate: Arc::new(Gate::new()),
            registry: Arc::new(WorkerRegistry::new()),
            scraper: Arc::new(MockScraper::new()),
            event_tx,
            cancel: CancellationToken::new(),
            id: WorkerId::new(),
        }
    }

    fn spawn(&self) -> tokio::task::JoinHandle<()> {
        self.registry.register(self.id);
        let ctx = WorkerContext {
            id: self.id,
            scraper: self.scraper.clone(),
            queue: self.queue.clone(),
            gate: self.gate.clone(),
            registry: self.registry.clone(),
            event_tx: self.event_tx.clone(),
            cancel: self.cancel.clone(),
        };
        tokio::spawn(run_worker(ctx))
    }

    async fn shutdown(&self, handle: tokio::task::JoinHandle<()>) {
        self.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker must acknowledge cancellation")
            .unwrap();
    }
}

fn item(doc: &str) -> WorkItem {
    WorkItem::new(doc, "2020")
}

fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_success_path_settles_and_signals_progress() {
    let harness = Harness::new();
    let mut events = harness.event_tx.subscribe();
    harness.gate.open();
    harness.queue.enqueue(item("1"));

    let handle = harness.spawn();
    tokio::time::timeout(Duration::from_secs(1), harness.queue.drain_wait())
        .await
        .expect("success must drain the queue");

    assert_eq!(harness.scraper.completions(&item("1")), 1);
    let record = harness.registry.record(&harness.id).unwrap();
    assert!(record.completed);
    assert_eq!(record.last_error, None);

    harness.shutdown(handle).await;

    let completed = drain_events(&mut events)
        .into_iter()
        .filter(|e| matches!(e, Event::ItemCompleted { .. }))
        .count();
    assert_eq!(completed, 1, "exactly one progress signal per settled item");
    assert_eq!(harness.registry.worker_count(), 0, "worker must deregister");
    assert_eq!(harness.scraper.open_sessions(), 0, "session must be released");
}

#[tokio::test]
async fn test_recoverable_failure_requeues_then_retry_succeeds() {
    let harness = Harness::new();
    let mut events = harness.event_tx.subscribe();
    harness.scraper.script(&item("1"), vec![MockOutcome::Recoverable]);
    harness.gate.open();
    harness.queue.enqueue(item("1"));

    let handle = harness.spawn();
    tokio::time::timeout(Duration::from_secs(1), harness.queue.drain_wait())
        .await
        .expect("retry must eventually drain the queue");

    let stats = harness.queue.stats();
    assert_eq!(stats.delivered, 2, "failed delivery plus the retry");
    assert_eq!(stats.settled, 2);
    assert_eq!(harness.scraper.completions(&item("1")), 1);

    harness.shutdown(handle).await;

    let requeued: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Event::ItemRequeued { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(requeued, vec![FailureKind::Recoverable]);
}

#[tokio::test]
async fn test_unknown_failure_takes_the_same_requeue_path() {
    let harness = Harness::new();
    let mut events = harness.event_tx.subscribe();
    harness.scraper.script(&item("1"), vec![MockOutcome::Unknown]);
    harness.gate.open();
    harness.queue.enqueue(item("1"));

    let handle = harness.spawn();
    tokio::time::timeout(Duration::from_secs(1), harness.queue.drain_wait())
        .await
        .expect("unknown failures must not stall the queue");

    assert_eq!(harness.scraper.completions(&item("1")), 1);
    harness.shutdown(handle).await;

    let requeued: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Event::ItemRequeued { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(requeued, vec![FailureKind::Unknown]);
}

#[tokio::test]
async fn test_cancel_mid_scrape_requeues_exactly_once() {
    let harness = Harness::new();
    harness.scraper.script(&item("1"), vec![MockOutcome::Hang]);
    harness.gate.open();
    harness.queue.enqueue(item("1"));

    let handle = harness.spawn();
    tokio::time::timeout(Duration::from_secs(1), harness.scraper.scrape_started())
        .await
        .expect("scrape must start");

    harness.shutdown(handle).await;

    let stats = harness.queue.stats();
    assert_eq!(stats.pending, 1, "the held item must be requeued, exactly once");
    assert_eq!(stats.in_flight(), 0, "the consumed delivery must be settled");
    assert_eq!(harness.registry.worker_count(), 0);
    assert_eq!(harness.scraper.open_sessions(), 0);
    assert_eq!(harness.scraper.completions(&item("1")), 0);
}

#[tokio::test]
async fn test_cancel_while_idle_requeues_nothing() {
    let harness = Harness::new();
    let handle = harness.spawn();

    // Worker is blocked on the closed gate with nothing in hand
    tokio::time::sleep(Duration::from_millis(20)).await;
    harness.shutdown(handle).await;

    let stats = harness.queue.stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.delivered, 0);
}

#[tokio::test]
async fn test_closed_gate_blocks_dequeue_until_pulse() {
    let harness = Harness::new();
    harness.queue.enqueue(item("1"));

    let handle = harness.spawn();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        harness.queue.stats().delivered,
        0,
        "no dequeue may complete behind a closed gate"
    );

    harness.gate.pulse();
    tokio::time::timeout(Duration::from_secs(1), harness.queue.drain_wait())
        .await
        .expect("one pulse must release one dequeue round");

    harness.shutdown(handle).await;
}
