//! # docket-scraper
//!
//! Worker-pool orchestration for browser-driven docket scraping behind a
//! rotating network identity.
//!
//! The pool runs many concurrent scrape workers over a shared work queue.
//! When the pool's collective failure rate says the current egress identity
//! is throttled or blocked, every worker is paused behind a shared gate, the
//! identity is rotated exactly once, and the pool resumes. No work item is
//! lost or double-counted, and cancellation is honored mid-flight.
//!
//! ## Design Philosophy
//!
//! - **Library-first**: no CLI or UI, purely a Rust crate for embedding
//! - **Event-driven**: consumers subscribe to events, no polling required
//! - **Liveness over crash**: scrape failures requeue, identity acquisition
//!   retries without bound, and only cancellation stops the pipeline
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use docket_scraper::{
//!     AntiCaptchaClient, Config, CsvSink, DocketScraper, JobSpec, NoOpRotator,
//!     ScrapePool, YearSpec,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     let captcha = Arc::new(AntiCaptchaClient::from_config(&config.captcha).await?);
//!     let sink = Arc::new(CsvSink::create(&config.output.csv_path).await?);
//!     let scraper = DocketScraper::new(Arc::new(config.clone()), captcha, sink);
//!
//!     let pool = ScrapePool::new(config, scraper, Arc::new(NoOpRotator))?;
//!
//!     // Subscribe to events
//!     let mut events = pool.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             tracing::info!(?event, "pool event");
//!         }
//!     });
//!
//!     let report = pool
//!         .run(&JobSpec {
//!             document_start: 100,
//!             document_range: 50,
//!             since_year: 2018,
//!             until_year: YearSpec::Current,
//!         })
//!         .await?;
//!
//!     println!("settled {} of {} items", report.settled, report.generated);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// CAPTCHA solving collaborator
pub mod captcha;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Pool-wide worker gate
pub mod gate;
/// Work item generation
pub mod generator;
/// Worker pool orchestration (decomposed into focused submodules)
pub mod pool;
/// Work queue with delivery/settlement tracking
pub mod queue;
/// Worker outcome registry
pub mod registry;
/// Retry logic with exponential backoff
pub mod retry;
/// Network identity rotation
pub mod rotation;
/// Scrape collaborator and the browser implementation
pub mod scrape;
/// Record persistence
pub mod sink;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use captcha::{AntiCaptchaClient, CaptchaSolver};
pub use config::{CaptchaConfig, Config, OutputConfig, PoolConfig, RotationConfig, ScrapeConfig};
pub use error::{Error, FailureKind, QueueError, Result, ScrapeError};
pub use gate::Gate;
pub use pool::ScrapePool;
pub use queue::WorkQueue;
pub use registry::{WorkerRecord, WorkerRegistry};
pub use rotation::{ExpressVpnRotator, IdentityRotator, NoOpRotator};
pub use scrape::{BrowserSession, DocketScraper, Scraper};
pub use sink::{CsvSink, RecordSink};
pub use types::{
    CaseRecord, Event, JobSpec, QueueStats, RunReport, WorkItem, WorkerId, YearSpec,
};
