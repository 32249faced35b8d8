//! Network identity rotation
//!
//! The pool evades throttling by rotating its outbound egress point whenever
//! the collective failure rate says the current identity is burned. The
//! [`IdentityRotator`] trait is the seam; [`ExpressVpnRotator`] shells out to
//! the expressvpn CLI, and [`NoOpRotator`] supports dry runs and tests.
//!
//! Acquiring a fresh identity retries unboundedly with a fixed backoff: the
//! pipeline cannot make progress without one, so waiting beats crashing.

mod expressvpn;

pub use expressvpn::ExpressVpnRotator;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::config::RotationConfig;
use crate::error::{Error, Result};

/// Collaborator that swaps the process's outbound network identity
#[async_trait]
pub trait IdentityRotator: Send + Sync {
    /// Egress locations available to connect to
    async fn locations(&self) -> Result<Vec<String>>;

    /// Connect to `location`, replacing the current identity
    async fn connect(&self, location: &str) -> Result<()>;

    /// Tear down the current connection; idempotent
    async fn disconnect(&self) -> Result<()>;
}

/// Rotator that succeeds without doing anything
///
/// Useful for dry runs and tests where no VPN daemon is available.
pub struct NoOpRotator;

#[async_trait]
impl IdentityRotator for NoOpRotator {
    async fn locations(&self) -> Result<Vec<String>> {
        Ok(vec!["local".to_string()])
    }

    async fn connect(&self, _location: &str) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// Connect to a randomly chosen egress location, retrying until it sticks
///
/// Every failure (listing locations or connecting) is logged at debug level
/// and retried after `config.retry_backoff`; there is no upper bound. After a
/// successful connect the tunnel is given `config.settle_delay` to stabilize.
/// Returns the location that was connected.
pub async fn establish_identity(
    rotator: &dyn IdentityRotator,
    config: &RotationConfig,
) -> String {
    loop {
        match try_connect_once(rotator).await {
            Ok(location) => {
                info!(location = %location, "network identity connected");
                tokio::time::sleep(config.settle_delay).await;
                return location;
            }
            Err(e) => {
                debug!(error = %e, "failed to rotate network identity, retrying");
                tokio::time::sleep(config.retry_backoff).await;
            }
        }
    }
}

async fn try_connect_once(rotator: &dyn IdentityRotator) -> Result<String> {
    let locations = rotator.locations().await?;
    let location = locations
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| Error::Rotation("no egress locations available".to_string()))?;

    rotator.connect(&location).await?;
    Ok(location)
}
