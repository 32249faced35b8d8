//! Record persistence
//!
//! Settled records flow into a [`RecordSink`]. The shipped [`CsvSink`]
//! appends to a CSV file created with a header row. The worker layer delivers
//! at-least-once, so a record may be appended more than once after a
//! partially-successful attempt; consumers must tolerate duplicate rows.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::types::CaseRecord;

/// CSV column order, matching [`CaseRecord`] field order
pub const FIELDS: [&str; 8] = [
    "document_number",
    "court",
    "judge",
    "date_start",
    "subject",
    "state",
    "plaintiff",
    "defendant",
];

/// Collaborator that persists parsed records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append one record; must tolerate duplicates
    async fn append(&self, record: &CaseRecord) -> Result<()>;
}

/// Append-only CSV file sink
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    /// Create the output file with its header row, truncating any previous run
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or written.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut header = FIELDS.join(",");
        header.push('\n');
        tokio::fs::write(&path, header).await?;
        Ok(Self { path })
    }

    /// Wrap an existing file without touching its contents
    pub fn open_existing(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    async fn append(&self, record: &CaseRecord) -> Result<()> {
        let line = to_csv_line(record);

        // Open per append so concurrent workers never share a file handle
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn to_csv_line(record: &CaseRecord) -> String {
    let fields = [
        &record.document_number,
        &record.court,
        &record.judge,
        &record.date_start,
        &record.subject,
        &record.state,
        &record.plaintiff,
        &record.defendant,
    ];

    let mut line = fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// Quote a field when it contains a comma, quote, or newline
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
