//! CLI-based identity rotator using the external expressvpn binary

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use super::IdentityRotator;
use crate::error::{Error, Result};

/// Identity rotator driving the `expressvpn` command-line client
///
/// Locations come from `expressvpn list all`; connecting and disconnecting
/// shell out to the corresponding subcommands. The daemon owns the tunnel,
/// so repeated `disconnect` calls are harmless.
///
/// # Examples
///
/// ```no_run
/// use docket_scraper::rotation::{ExpressVpnRotator, IdentityRotator};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let rotator = ExpressVpnRotator::from_path()
///     .expect("expressvpn not found in PATH");
///
/// let locations = rotator.locations().await?;
/// rotator.connect(&locations[0]).await?;
/// # Ok(())
/// # }
/// ```
pub struct ExpressVpnRotator {
    binary_path: PathBuf,
}

impl ExpressVpnRotator {
    /// Create a rotator with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find expressvpn in PATH
    ///
    /// Returns `None` when the binary is not installed.
    pub fn from_path() -> Option<Self> {
        which::which("expressvpn").ok().map(Self::new)
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new(&self.binary_path)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute expressvpn: {}", e)))
    }
}

#[async_trait]
impl IdentityRotator for ExpressVpnRotator {
    async fn locations(&self) -> Result<Vec<String>> {
        let output = self.run(&["list", "all"]).await?;
        if !output.status.success() {
            return Err(Error::Rotation(format!(
                "expressvpn list failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let locations = parse_location_list(&String::from_utf8_lossy(&output.stdout));
        if locations.is_empty() {
            return Err(Error::Rotation("expressvpn reported no locations".to_string()));
        }
        Ok(locations)
    }

    async fn connect(&self, location: &str) -> Result<()> {
        debug!(location, "connecting expressvpn");
        let output = self.run(&["connect", location]).await?;
        if !output.status.success() {
            return Err(Error::Rotation(format!(
                "expressvpn connect {} failed: {}",
                location,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        // "Disconnected" and "not connected" both count as disconnected
        let output = self.run(&["disconnect"]).await?;
        if !output.status.success() {
            debug!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "expressvpn disconnect reported failure, treating as already disconnected"
            );
        }
        Ok(())
    }
}

/// Parse `expressvpn list all` output into location aliases
///
/// The output is a header followed by one row per location whose first column
/// is the alias. Separator rows and the recommended-marker column are
/// skipped.
fn parse_location_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(2) // header + separator
        .filter_map(|line| line.split_whitespace().next())
        .filter(|alias| !alias.is_empty() && alias.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|alias| alias.to_string())
        .collect()
}
