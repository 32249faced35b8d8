//! Scrape collaborator: the per-item external interaction
//!
//! The pool drives a [`Scraper`] without knowing anything about browsers,
//! CAPTCHAs, or persistence: it opens one long-lived session per worker,
//! feeds it work items, and classifies every failure into the two-class
//! taxonomy ([`ScrapeError`](crate::error::ScrapeError)). The shipped
//! [`DocketScraper`] fills the docket search form in a Chromium page, solves
//! the image CAPTCHA, walks the result detail pages, and appends parsed
//! records to the sink.

mod browser;
mod docket;
pub(crate) mod record;

pub use browser::BrowserSession;
pub use docket::DocketScraper;

use async_trait::async_trait;

use crate::error::{Result, ScrapeError};
use crate::types::WorkItem;

/// End-to-end scrape interaction for one item at a time
///
/// Implementations must be safe to invoke repeatedly with the same item
/// across independent sessions: a requeued item may be retried by any worker.
#[async_trait]
pub trait Scraper: Send + Sync + 'static {
    /// Long-lived per-worker session resource (e.g. a browser process)
    type Session: Send + 'static;

    /// Open a fresh session for a worker
    async fn open_session(&self) -> Result<Self::Session>;

    /// Process one item against the given session
    ///
    /// A per-item deadline is the implementation's responsibility; elapsing
    /// it must classify as [`ScrapeError::Recoverable`].
    async fn scrape(
        &self,
        session: &mut Self::Session,
        item: &WorkItem,
    ) -> std::result::Result<(), ScrapeError>;

    /// Release a session's resources; called exactly once per session
    async fn close_session(&self, session: Self::Session);
}
