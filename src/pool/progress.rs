//! Progress reporting off the event stream
//!
//! Counts one signal per successfully settled item, the same contract the
//! original progress bar consumed. Rendering is the embedder's business; the
//! reporter logs milestones and stops once every generated item is counted.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::types::Event;

/// Task counting completed items against the run total
pub(crate) struct ProgressReporter {
    pub(crate) total: u64,
    pub(crate) events: broadcast::Receiver<Event>,
    pub(crate) cancel: CancellationToken,
}

impl ProgressReporter {
    /// Run until every item is counted, the stream closes, or cancellation
    pub(crate) async fn run(mut self) {
        debug!(total = self.total, "progress reporter started");
        let mut completed: u64 = 0;

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => return,
                event = self.events.recv() => event,
            };

            match event {
                Ok(Event::ItemCompleted { item, .. }) => {
                    completed += 1;
                    info!(completed, total = self.total, item = %item, "item completed");
                    if completed >= self.total {
                        debug!("all items accounted for");
                        return;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "progress reporter lagged behind the event stream");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}
