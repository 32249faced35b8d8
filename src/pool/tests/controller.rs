use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, PoolConfig, RotationConfig};
use crate::error::FailureKind;
use crate::gate::Gate;
use crate::pool::RotationController;
use crate::pool::test_helpers::MockRotator;
use crate::queue::WorkQueue;
use crate::registry::WorkerRegistry;
use crate::types::{Event, WorkItem, WorkerId};

/// Controller wired to fresh shared state with fake registered workers
struct Harness {
    queue: Arc<WorkQueue>,
    gate: Arc<Gate>,
    registry: Arc<WorkerRegistry>,
    rotator: Arc<MockRotator>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
    workers: Vec<WorkerId>,
}

impl Harness {
    fn new(worker_count: usize, rotator: MockRotator) -> Self {
        let (event_tx, _rx) = broadcast::channel(256);
        let registry = Arc::new(WorkerRegistry::new());

        let workers: Vec<WorkerId> = (0..worker_count).map(|_| WorkerId::new()).collect();
        for id in &workers {
            registry.register(*id);
        }

        Self {
            queue: Arc::new(WorkQueue::new()),
            gate: Arc::new(Gate::new()),
            registry,
            rotator: Arc::new(rotator),
            event_tx,
            cancel: CancellationToken::new(),
            workers,
        }
    }

    fn config(&self, failure_ratio: f64) -> Config {
        Config {
            pool: PoolConfig {
                workers: self.workers.len(),
                failure_ratio,
                poll_interval: Duration::from_millis(5),
            },
            rotation: RotationConfig {
                retry_backoff: Duration::from_millis(5),
                settle_delay: Duration::from_millis(1),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn spawn(&self, failure_ratio: f64) -> tokio::task::JoinHandle<()> {
        let controller = RotationController {
            config: Arc::new(self.config(failure_ratio)),
            queue: self.queue.clone(),
            gate: self.gate.clone(),
            registry: self.registry.clone(),
            rotator: self.rotator.clone(),
            event_tx: self.event_tx.clone(),
            cancel: self.cancel.clone(),
        };
        tokio::spawn(controller.run())
    }

    async fn shutdown(&self, handle: tokio::task::JoinHandle<()>) {
        self.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("controller must acknowledge cancellation")
            .unwrap();
    }
}

async fn wait_for_event(
    rx: &mut broadcast::Receiver<Event>,
    want: fn(&Event) -> bool,
) -> Event {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event channel open");
            if want(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event within deadline")
}

#[tokio::test]
async fn test_rotation_triggers_exactly_once_after_threshold_breach() {
    // workers=5, ratio=0.6 => threshold=3; live must drop below 3
    let harness = Harness::new(5, MockRotator::new());
    let mut events = harness.event_tx.subscribe();
    let handle = harness.spawn(0.6);

    for id in harness.workers.iter().take(3) {
        harness.registry.mark_failed(id, FailureKind::Recoverable);
    }

    let started = wait_for_event(&mut events, |e| matches!(e, Event::RotationStarted { .. })).await;
    match started {
        Event::RotationStarted { live, threshold } => {
            assert_eq!(threshold, 3);
            assert!(live < 3, "rotation must only start below threshold, live={}", live);
        }
        _ => unreachable!(),
    }

    wait_for_event(&mut events, |e| matches!(e, Event::RotationCompleted { .. })).await;
    assert_eq!(harness.rotator.connect_count(), 1);

    // No further failures: the fresh round must not rotate again
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.rotator.connect_count(), 1, "rotation must fire exactly once");

    harness.shutdown(handle).await;
}

#[tokio::test]
async fn test_completed_rotation_resets_live_count_and_threshold() {
    let harness = Harness::new(1, MockRotator::new());
    let mut events = harness.event_tx.subscribe();
    let handle = harness.spawn(1.0);

    harness.registry.mark_failed(&harness.workers[0], FailureKind::Unknown);
    let completed =
        wait_for_event(&mut events, |e| matches!(e, Event::RotationCompleted { .. })).await;
    match completed {
        Event::RotationCompleted { live, threshold, .. } => {
            assert_eq!(live, 1, "credit resets from the current worker count");
            assert_eq!(threshold, 1);
        }
        _ => unreachable!(),
    }

    // A fresh failure under the new identity must trigger a second rotation
    harness.registry.mark_failed(&harness.workers[0], FailureKind::Recoverable);
    wait_for_event(&mut events, |e| matches!(e, Event::RotationCompleted { .. })).await;
    assert_eq!(harness.rotator.connect_count(), 2);

    harness.shutdown(handle).await;
}

#[tokio::test]
async fn test_gate_closed_while_rotation_pending_and_reopens_after() {
    let harness = Harness::new(2, MockRotator::gated());
    let mut events = harness.event_tx.subscribe();
    let handle = harness.spawn(1.0);

    harness.registry.mark_failed(&harness.workers[0], FailureKind::Recoverable);
    wait_for_event(&mut events, |e| matches!(e, Event::RotationStarted { .. })).await;

    // Rotation pending (connect is held): the gate must stay shut
    let blocked = tokio::time::timeout(Duration::from_millis(100), harness.gate.wait()).await;
    assert!(blocked.is_err(), "no worker may pass the gate during rotation");

    harness.rotator.release_connect();
    wait_for_event(&mut events, |e| matches!(e, Event::RotationCompleted { .. })).await;

    // The next round's pulses release the pool again
    tokio::time::timeout(Duration::from_millis(500), harness.gate.wait())
        .await
        .expect("gate must reopen after rotation completes");

    harness.shutdown(handle).await;
}

#[tokio::test]
async fn test_rotation_waits_for_in_flight_deliveries_to_settle() {
    let harness = Harness::new(1, MockRotator::new());
    let mut events = harness.event_tx.subscribe();

    // A delivery held by a (simulated) worker
    harness.queue.enqueue(WorkItem::new("1", "2020"));
    let held = harness.queue.dequeue().await;

    let handle = harness.spawn(1.0);
    harness.registry.mark_failed(&harness.workers[0], FailureKind::Recoverable);
    wait_for_event(&mut events, |e| matches!(e, Event::RotationStarted { .. })).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        harness.rotator.connect_count(),
        0,
        "rotation must wait for the queue to quiesce"
    );

    harness.queue.settle(&held).unwrap();
    wait_for_event(&mut events, |e| matches!(e, Event::RotationCompleted { .. })).await;
    assert_eq!(harness.rotator.connect_count(), 1);

    harness.shutdown(handle).await;
}

#[tokio::test]
async fn test_identity_acquisition_retries_unboundedly() {
    let harness = Harness::new(1, MockRotator::failing(4));
    let mut events = harness.event_tx.subscribe();
    let handle = harness.spawn(1.0);

    harness.registry.mark_failed(&harness.workers[0], FailureKind::Recoverable);
    wait_for_event(&mut events, |e| matches!(e, Event::RotationCompleted { .. })).await;

    assert_eq!(
        harness.rotator.connect_count(),
        5,
        "four scripted failures plus the success"
    );

    harness.shutdown(handle).await;
}

#[tokio::test]
async fn test_healthy_pool_is_pulsed_not_left_open() {
    let harness = Harness::new(3, MockRotator::new());
    let handle = harness.spawn(0.5);

    // Pulses arrive every poll tick while healthy
    tokio::time::timeout(Duration::from_millis(500), harness.gate.wait())
        .await
        .expect("healthy pool must receive pulses");
    assert!(!harness.gate.is_open(), "pulses must not leave the gate open");
    assert_eq!(harness.rotator.connect_count(), 0, "no rotation while healthy");

    harness.shutdown(handle).await;
}
