//! Core types for docket-scraper

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FailureKind;

/// One unit of external work: a document identifier paired with a filing year
///
/// Items are produced once by the generator and may re-enter the queue
/// unchanged after a failed attempt.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    /// Document identifier, as entered into the search form
    pub document_id: String,
    /// Filing year, as selected in the search form
    pub year: String,
}

impl WorkItem {
    /// Create a new work item
    pub fn new(document_id: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            year: year.into(),
        }
    }
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.document_id, self.year)
    }
}

/// Unique identifier for a worker task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub Uuid);

impl WorkerId {
    /// Generate a fresh worker identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One parsed docket record, in CSV column order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Document number as shown on the detail page
    pub document_number: String,
    /// Court handling the case
    pub court: String,
    /// Presiding judge
    pub judge: String,
    /// Filing date
    pub date_start: String,
    /// Case subject
    pub subject: String,
    /// Procedural state
    pub state: String,
    /// Plaintiff name
    pub plaintiff: String,
    /// Defendant name (may be empty)
    pub defendant: String,
}

/// Queue counters, read atomically under the queue lock
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Items waiting in the backing store
    pub pending: u64,
    /// Total deliveries handed to workers
    pub delivered: u64,
    /// Total deliveries marked done
    pub settled: u64,
}

impl QueueStats {
    /// Deliveries currently held by workers (delivered but not yet settled)
    pub fn in_flight(&self) -> u64 {
        self.delivered.saturating_sub(self.settled)
    }
}

/// Upper bound of the year range for a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearSpec {
    /// Resolve to the current local year at run time
    Current,
    /// A fixed year
    Year(i32),
}

impl YearSpec {
    /// Resolve to a concrete year
    pub fn resolve(&self) -> i32 {
        use chrono::Datelike;
        match self {
            YearSpec::Current => chrono::Local::now().year(),
            YearSpec::Year(y) => *y,
        }
    }
}

impl std::str::FromStr for YearSpec {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("current") {
            Ok(YearSpec::Current)
        } else {
            Ok(YearSpec::Year(s.parse()?))
        }
    }
}

/// Parameters for one scraping run
///
/// These mirror the run-scoped knobs (as opposed to the ambient settings in
/// [`Config`](crate::config::Config)): which documents to query and over which
/// years.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// First document number to query
    pub document_start: u64,
    /// How many consecutive document numbers to query per year
    pub document_range: u64,
    /// First year of the range (inclusive)
    pub since_year: i32,
    /// Last year of the range (inclusive)
    pub until_year: YearSpec,
}

/// Final counters returned by a completed run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Items produced by the generator
    pub generated: u64,
    /// Total deliveries over the run (requeues deliver again)
    pub delivered: u64,
    /// Total settlements over the run
    pub settled: u64,
}

/// Event emitted during the pool lifecycle
///
/// Consumers subscribe via [`ScrapePool::subscribe`](crate::pool::ScrapePool::subscribe);
/// one `ItemCompleted` is emitted per successfully settled item.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A worker task started and registered itself
    WorkerStarted {
        /// Worker identity
        worker: WorkerId,
    },

    /// A worker task finished its cleanup and deregistered
    WorkerStopped {
        /// Worker identity
        worker: WorkerId,
    },

    /// An item was scraped successfully and settled
    ItemCompleted {
        /// The settled item
        item: WorkItem,
        /// Worker that completed it
        worker: WorkerId,
    },

    /// A failed item was returned to the queue
    ItemRequeued {
        /// The requeued item
        item: WorkItem,
        /// Worker that attempted it
        worker: WorkerId,
        /// Failure classification
        kind: FailureKind,
    },

    /// The failure threshold was crossed; the pool is pausing for rotation
    RotationStarted {
        /// Liveness credit at the moment the threshold was crossed
        live: i64,
        /// Threshold for this round
        threshold: i64,
    },

    /// A new network identity is connected; the pool is resuming
    RotationCompleted {
        /// Egress location that was connected
        location: String,
        /// Liveness credit for the next round
        live: i64,
        /// Threshold for the next round
        threshold: i64,
    },

    /// Every generated item has been settled
    Drained,

    /// The pool finished teardown
    Shutdown,
}
