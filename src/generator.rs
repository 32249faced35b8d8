//! Deterministic work item generation
//!
//! Expands a run's document range and year range into the ordered item
//! sequence the pool consumes: year-major, offset-minor, so every document
//! number of a year is queried before the next year starts.

use tracing::debug;

use crate::types::{JobSpec, WorkItem};

/// Expand a job into its full, ordered item sequence
///
/// For each year in `[since_year, until_year]` (inclusive), for each offset in
/// `[0, document_range)`, emits `(document_start + offset, year)`.
///
/// An inverted year range or a zero document range produces an empty sequence;
/// the pool then drains immediately.
pub fn expand(job: &JobSpec) -> Vec<WorkItem> {
    let until = job.until_year.resolve();
    let mut items = Vec::new();

    for year in job.since_year..=until {
        for offset in 0..job.document_range {
            items.push(WorkItem::new(
                (job.document_start + offset).to_string(),
                year.to_string(),
            ));
        }
    }

    debug!(
        count = items.len(),
        since = job.since_year,
        until,
        "expanded job into work items"
    );

    items
}
