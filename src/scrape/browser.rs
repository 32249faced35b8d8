//! Browser session management
//!
//! Each worker owns one Chromium process for its whole lifetime; pages are
//! cheap and opened per item, the process is not.

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Error, Result};

/// A running Chromium instance plus its CDP event pump
pub struct BrowserSession {
    pub(crate) browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch a browser
    ///
    /// `request_timeout` bounds individual CDP requests; the per-item
    /// deadline wraps the whole interaction separately.
    pub async fn launch(headless: bool, request_timeout: Duration) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(request_timeout)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");

        if !headless {
            builder = builder.with_head();
        }

        let config = builder.build().map_err(Error::Session)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::Session(format!("failed to launch browser: {}", e)))?;

        // Pump CDP events until the connection drops
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!("browser session launched");
        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Close the browser process and stop the event pump
    ///
    /// Failures are logged, not surfaced: teardown must always complete.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "browser close reported failure");
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "browser wait reported failure");
        }
        self.handler_task.abort();
        debug!("browser session closed");
    }
}
