//! Configuration types for docket-scraper

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Worker pool and rotation-decision configuration
///
/// Groups the settings that drive the orchestration layer. Used as a nested
/// sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of concurrent scrape workers (default: 5)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Fraction of the pool that must degrade before the identity rotates
    /// (default: 0.6)
    ///
    /// The rotation threshold is `ceil(workers × failure_ratio)`; once the
    /// pool's liveness credit drops below it, every worker is paused and the
    /// network identity is rotated exactly once.
    #[serde(default = "default_failure_ratio")]
    pub failure_ratio: f64,

    /// Interval between controller scans of worker outcomes (default: 100 ms)
    #[serde(default = "default_poll_interval", with = "duration_millis_serde")]
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            failure_ratio: default_failure_ratio(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// Browser scraping configuration
///
/// Groups settings for the per-item browser interaction. Used as a nested
/// sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Search page URL
    #[serde(default)]
    pub url: String,

    /// Per-item deadline for the whole interaction (default: 60 seconds)
    ///
    /// Elapsing this deadline is the recoverable-failure signal the rotation
    /// decision is built on.
    #[serde(default = "default_item_timeout", with = "duration_millis_serde")]
    pub item_timeout: Duration,

    /// Pause after each click while the page settles (default: 1 second)
    #[serde(default = "default_action_delay", with = "duration_millis_serde")]
    pub action_delay: Duration,

    /// Run the browser headless (default: true)
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Judicial district selected in the search form (default: "LIMA")
    #[serde(default = "default_district")]
    pub district: String,

    /// Court selected in the search form (default: "JUZGADO DE PAZ LETRADO")
    #[serde(default = "default_court")]
    pub court: String,

    /// Specialty selected in the search form (default: "CIVIL")
    #[serde(default = "default_specialty")]
    pub specialty: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            item_timeout: default_item_timeout(),
            action_delay: default_action_delay(),
            headless: true,
            district: default_district(),
            court: default_court(),
            specialty: default_specialty(),
        }
    }
}

/// Network identity rotation configuration
///
/// Groups settings for the VPN CLI collaborator and the unbounded retry loop
/// around it. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Path to the expressvpn executable (auto-detected if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Whether to search PATH for the binary if no explicit path is set
    /// (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Fixed backoff between failed rotation attempts (default: 2 seconds)
    ///
    /// The retry loop has no upper bound; no progress is possible without a
    /// fresh identity.
    #[serde(default = "default_retry_backoff", with = "duration_millis_serde")]
    pub retry_backoff: Duration,

    /// Pause after a successful connect while the tunnel settles
    /// (default: 5 seconds)
    #[serde(default = "default_settle_delay", with = "duration_millis_serde")]
    pub settle_delay: Duration,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            search_path: true,
            retry_backoff: default_retry_backoff(),
            settle_delay: default_settle_delay(),
        }
    }
}

/// CAPTCHA solving service configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptchaConfig {
    /// Service endpoint (default: the Anti-Captcha API)
    #[serde(default = "default_captcha_api_url")]
    pub api_url: String,

    /// API key, inline
    #[serde(default)]
    pub api_key: Option<String>,

    /// Path to a file holding the API key (read and trimmed at startup;
    /// takes effect when `api_key` is unset)
    #[serde(default)]
    pub api_key_path: Option<PathBuf>,

    /// Interval between task-result polls (default: 2 seconds)
    #[serde(default = "default_captcha_poll_interval", with = "duration_millis_serde")]
    pub poll_interval: Duration,

    /// Maximum number of task-result polls before giving up (default: 30)
    #[serde(default = "default_captcha_max_polls")]
    pub max_polls: u32,

    /// Retry policy for transient HTTP failures against the service
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            api_url: default_captcha_api_url(),
            api_key: None,
            api_key_path: None,
            poll_interval: default_captcha_poll_interval(),
            max_polls: default_captcha_max_polls(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl CaptchaConfig {
    /// Resolve the API key, reading `api_key_path` if no inline key is set
    ///
    /// # Errors
    ///
    /// Returns a configuration error if neither source is set, or an I/O
    /// error if the key file cannot be read.
    pub async fn load_api_key(&self) -> Result<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        if let Some(path) = &self.api_key_path {
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to read API key file '{}': {}", path.display(), e),
                ))
            })?;
            return Ok(raw.trim().to_string());
        }
        Err(Error::Config {
            message: "no CAPTCHA API key configured".to_string(),
            key: Some("captcha.api_key".to_string()),
        })
    }
}

/// Output configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// CSV file that settled records are appended to (default: "output.csv")
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
        }
    }
}

/// Main configuration for the scrape pool
///
/// Fields are organized into logical sub-configs:
/// - [`pool`](PoolConfig): worker count, failure ratio, poll interval
/// - [`scrape`](ScrapeConfig): URL, per-item timeout, delays, headless mode
/// - [`rotation`](RotationConfig): VPN binary, retry backoff, settle delay
/// - [`captcha`](CaptchaConfig): solving service endpoint and key
/// - [`output`](OutputConfig): CSV destination
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Worker pool and rotation-decision settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Browser scraping settings
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Network identity rotation settings
    #[serde(default)]
    pub rotation: RotationConfig,

    /// CAPTCHA solving settings
    #[serde(default)]
    pub captcha: CaptchaConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Validate cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the worker count is zero or the
    /// failure ratio falls outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.pool.workers == 0 {
            return Err(Error::Config {
                message: "worker count must be positive".to_string(),
                key: Some("pool.workers".to_string()),
            });
        }
        if !(0.0..=1.0).contains(&self.pool.failure_ratio) {
            return Err(Error::Config {
                message: format!(
                    "failure ratio must be within [0, 1], got {}",
                    self.pool.failure_ratio
                ),
                key: Some("pool.failure_ratio".to_string()),
            });
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    5
}

fn default_failure_ratio() -> f64 {
    0.6
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_item_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_action_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_true() -> bool {
    true
}

fn default_district() -> String {
    "LIMA".to_string()
}

fn default_court() -> String {
    "JUZGADO DE PAZ LETRADO".to_string()
}

fn default_specialty() -> String {
    "CIVIL".to_string()
}

fn default_retry_backoff() -> Duration {
    Duration::from_secs(2)
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_captcha_api_url() -> String {
    "https://api.anti-captcha.com".to_string()
}

fn default_captcha_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_captcha_max_polls() -> u32 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("output.csv")
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
