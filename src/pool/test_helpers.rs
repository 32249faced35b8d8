//! Shared test doubles for pool tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tokio::sync::{Notify, Semaphore};

use crate::error::{Error, Result, ScrapeError};
use crate::rotation::IdentityRotator;
use crate::scrape::Scraper;
use crate::types::WorkItem;

/// Scripted behavior for one scrape attempt
#[derive(Clone, Copy, Debug)]
pub(crate) enum MockOutcome {
    Success,
    Recoverable,
    Unknown,
    /// Never returns; used to park a worker mid-scrape for cancellation tests
    Hang,
}

/// Scraper double with per-item scripted outcomes (default: success)
pub(crate) struct MockScraper {
    scripted: Mutex<HashMap<WorkItem, VecDeque<MockOutcome>>>,
    completions: Mutex<HashMap<WorkItem, u32>>,
    open_sessions: AtomicUsize,
    scrape_started: Notify,
}

impl MockScraper {
    pub(crate) fn new() -> Self {
        Self {
            scripted: Mutex::new(HashMap::new()),
            completions: Mutex::new(HashMap::new()),
            open_sessions: AtomicUsize::new(0),
            scrape_started: Notify::new(),
        }
    }

    /// Queue outcomes for an item; attempts beyond the script succeed
    pub(crate) fn script(&self, item: &WorkItem, outcomes: Vec<MockOutcome>) {
        self.scripted
            .lock()
            .unwrap()
            .insert(item.clone(), outcomes.into());
    }

    /// How many times an item completed successfully
    pub(crate) fn completions(&self, item: &WorkItem) -> u32 {
        *self.completions.lock().unwrap().get(item).unwrap_or(&0)
    }

    /// Sessions currently open
    pub(crate) fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Wait until the next scrape attempt has started
    pub(crate) async fn scrape_started(&self) {
        self.scrape_started.notified().await;
    }
}

#[async_trait]
impl Scraper for MockScraper {
    type Session = ();

    async fn open_session(&self) -> Result<Self::Session> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn scrape(
        &self,
        _session: &mut Self::Session,
        item: &WorkItem,
    ) -> std::result::Result<(), ScrapeError> {
        self.scrape_started.notify_one();

        let outcome = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(item)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(MockOutcome::Success);

        match outcome {
            MockOutcome::Success => {
                *self.completions.lock().unwrap().entry(item.clone()).or_insert(0) += 1;
                Ok(())
            }
            MockOutcome::Recoverable => Err(ScrapeError::Recoverable("scripted timeout".into())),
            MockOutcome::Unknown => Err(ScrapeError::Unknown("scripted failure".into())),
            MockOutcome::Hang => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
        }
    }

    async fn close_session(&self, _session: Self::Session) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Rotator double counting connects, with optional scripted failures and an
/// optional gate that holds connect() until released
pub(crate) struct MockRotator {
    connects: AtomicU32,
    disconnects: AtomicU32,
    failures_before_success: AtomicU32,
    release: Option<Semaphore>,
}

impl MockRotator {
    pub(crate) fn new() -> Self {
        Self {
            connects: AtomicU32::new(0),
            disconnects: AtomicU32::new(0),
            failures_before_success: AtomicU32::new(0),
            release: None,
        }
    }

    /// Fail this many connects before succeeding
    pub(crate) fn failing(failures: u32) -> Self {
        let rotator = Self::new();
        rotator.failures_before_success.store(failures, Ordering::SeqCst);
        rotator
    }

    /// Hold every connect until [`release_connect`](Self::release_connect)
    pub(crate) fn gated() -> Self {
        Self {
            release: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    /// Allow one held connect to proceed
    pub(crate) fn release_connect(&self) {
        if let Some(semaphore) = &self.release {
            semaphore.add_permits(1);
        }
    }

    pub(crate) fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnect_count(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityRotator for MockRotator {
    async fn locations(&self) -> Result<Vec<String>> {
        Ok(vec!["alpha".to_string(), "beta".to_string()])
    }

    async fn connect(&self, _location: &str) -> Result<()> {
        if let Some(semaphore) = &self.release {
            let permit = semaphore.acquire().await.map_err(|_| {
                Error::Rotation("connect gate closed".to_string())
            })?;
            permit.forget();
        }

        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.failures_before_success.load(Ordering::SeqCst) > 0 {
            self.failures_before_success.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Rotation("scripted connect failure".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
