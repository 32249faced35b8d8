//! Detail page text parsing
//!
//! The detail view renders the case header and the parties panel as plain
//! label/value text. After dropping blank lines, the values sit at fixed
//! offsets between their labels; those offsets are part of the site's layout
//! contract and a shift there is a parse failure, not a guess.

use crate::types::CaseRecord;

// Value offsets within the non-blank lines of each panel
const HEADER_DOCUMENT_NUMBER: usize = 1;
const HEADER_COURT: usize = 3;
const HEADER_JUDGE: usize = 7;
const HEADER_DATE_START: usize = 11;
const HEADER_SUBJECT: usize = 19;
const HEADER_STATE: usize = 21;
const PARTIES_PLAINTIFF: usize = 7;
const PARTIES_DEFENDANT: usize = 10;

/// Parse one record from the header panel and parties panel text
///
/// Returns `None` when the panels do not match the expected layout; the
/// caller classifies that as an unknown failure for the whole item.
pub(crate) fn parse_record(header: &str, parties: &str) -> Option<CaseRecord> {
    let header_lines = non_blank_lines(header);
    let parties_lines = non_blank_lines(parties);

    Some(CaseRecord {
        document_number: header_lines.get(HEADER_DOCUMENT_NUMBER)?.to_string(),
        court: header_lines.get(HEADER_COURT)?.to_string(),
        judge: header_lines.get(HEADER_JUDGE)?.to_string(),
        date_start: header_lines.get(HEADER_DATE_START)?.to_string(),
        subject: header_lines.get(HEADER_SUBJECT)?.to_string(),
        state: header_lines.get(HEADER_STATE)?.to_string(),
        plaintiff: parties_lines.get(PARTIES_PLAINTIFF)?.to_string(),
        // The defendant slot is absent for single-party filings
        defendant: parties_lines
            .get(PARTIES_DEFENDANT)
            .map(|s| s.to_string())
            .unwrap_or_default(),
    })
}

fn non_blank_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}
