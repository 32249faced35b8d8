//! Error types for docket-scraper
//!
//! This module provides error handling for the library, including:
//! - The two-class scrape failure taxonomy (recoverable vs unknown)
//! - Domain-specific error types (rotation, CAPTCHA, queue bookkeeping)
//! - The crate-wide `Error`/`Result` pair

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for docket-scraper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for docket-scraper
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "failure_ratio")
        key: Option<String>,
    },

    /// Browser session error (launch, page creation, teardown)
    #[error("session error: {0}")]
    Session(String),

    /// Network identity rotation error
    #[error("rotation error: {0}")]
    Rotation(String),

    /// CAPTCHA solving error
    #[error("captcha error: {0}")]
    Captcha(String),

    /// Queue bookkeeping violation
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (the VPN CLI)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Queue bookkeeping errors
///
/// These indicate a broken delivery/settlement pairing, which is a bug in the
/// caller rather than a runtime condition to recover from.
#[derive(Debug, Error)]
pub enum QueueError {
    /// settle() was called when no delivery is outstanding
    #[error("settle called for {document_id}/{year} with no outstanding delivery")]
    SettleWithoutDelivery {
        /// Document identifier of the item that was settled
        document_id: String,
        /// Year of the item that was settled
        year: String,
    },
}

/// Classified outcome of a failed scrape attempt
///
/// The scrape collaborator reduces every failure to one of two classes. Both
/// classes cause the item to be requeued and count against the pool's liveness
/// credit; neither escalates past the worker.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Timeout-class failure, the signature of a throttled or blocked identity
    #[error("scrape timed out: {0}")]
    Recoverable(String),

    /// Any other failure from the scrape collaborator
    ///
    /// Kept as a deliberate named fallback rather than blanket suppression.
    /// The full detail is logged by the worker; orchestration treats it
    /// conservatively as also indicating possible blocking.
    #[error("scrape failed: {0}")]
    Unknown(String),
}

impl ScrapeError {
    /// The failure class, as recorded in the worker registry
    pub fn kind(&self) -> FailureKind {
        match self {
            ScrapeError::Recoverable(_) => FailureKind::Recoverable,
            ScrapeError::Unknown(_) => FailureKind::Unknown,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        match e {
            chromiumoxide::error::CdpError::Timeout => {
                ScrapeError::Recoverable("browser request timed out".to_string())
            }
            other => ScrapeError::Unknown(other.to_string()),
        }
    }
}

/// The two-class failure taxonomy carried in worker records and events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Classified timeout, likely identity-blocked
    Recoverable,
    /// Anything else the scrape collaborator raised
    Unknown,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Recoverable => write!(f, "recoverable"),
            FailureKind::Unknown => write!(f, "unknown"),
        }
    }
}
