//! Pool-wide gate pausing and resuming all workers together
//!
//! A single shared signal every worker consults before each dequeue. The
//! rotation controller keeps the gate closed and releases workers in
//! controlled pulses: one pulse wakes every currently-blocked worker for
//! exactly one dequeue round, instead of unblocking the pool indefinitely.
//! Leaving the gate open (via [`Gate::open`]) lets workers run freely.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Shared gate governing worker progress
///
/// Created closed; workers block in [`wait`](Gate::wait) until the gate is
/// opened or pulsed.
#[derive(Debug, Default)]
pub struct Gate {
    open: AtomicBool,
    notify: Notify,
}

impl Gate {
    /// Create a closed gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the gate is currently open
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Open the gate and wake every blocked worker
    pub fn open(&self) {
        self.open.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Close the gate; workers block before their next dequeue
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Release every currently-blocked worker for one round, staying closed
    ///
    /// Workers not blocked at the moment of the pulse are unaffected and will
    /// block on their next [`wait`](Gate::wait).
    pub fn pulse(&self) {
        self.notify.notify_waiters();
    }

    /// Block until the gate is open or the next pulse
    ///
    /// Returns immediately when the gate is open. The wakeup future is
    /// enabled before the open check, so an open or pulse landing in between
    /// is never missed.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_open() {
            return;
        }

        notified.await;
    }
}
