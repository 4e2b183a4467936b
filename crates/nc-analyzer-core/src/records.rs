//! CSV boundary for the incident log.
//!
//! [`load_from_reader`] is the single place where tabular rows become typed
//! [`Record`]s. The column schema is fixed ([`RECORD_COLUMNS`]); any schema
//! column missing from the header is filled with `""`, extra columns are
//! ignored, and short rows are padded. Only an unreadable source is an error.

use sha2::{Digest, Sha256};
use std::io::Read;

use crate::error::{NcError, NcResult};
use crate::models::{Record, RecordCollection};

/// The fixed column schema, in normalized order.
pub const RECORD_COLUMNS: [&str; 9] = [
    "date",
    "shift",
    "factory",
    "machine",
    "issue",
    "root_cause",
    "correction",
    "corrective_action",
    "reported_by",
];

/// Parse an incident log from any CSV source.
///
/// # Errors
///
/// Returns [`NcError::DataSource`] when the source has no header row, is not
/// valid UTF-8, or is otherwise unparseable as CSV.
pub fn load_from_reader<R: Read>(reader: R) -> NcResult<RecordCollection> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| NcError::DataSource(format!("failed to read CSV header: {}", e)))?
        .clone();

    if headers.is_empty() {
        return Err(NcError::DataSource("CSV source has no header row".into()));
    }

    // Position of each schema column in the source, if present.
    let positions: Vec<Option<usize>> = RECORD_COLUMNS
        .iter()
        .map(|col| {
            headers
                .iter()
                .position(|h| normalize_header(h) == *col)
        })
        .collect();

    let missing: Vec<&str> = RECORD_COLUMNS
        .iter()
        .zip(&positions)
        .filter(|(_, p)| p.is_none())
        .map(|(c, _)| *c)
        .collect();
    if !missing.is_empty() {
        tracing::debug!(columns = ?missing, "filling absent columns with empty values");
    }

    let mut records = Vec::new();
    for (line, row) in rdr.records().enumerate() {
        let row = row.map_err(|e| {
            NcError::DataSource(format!("failed to parse CSV row {}: {}", line + 2, e))
        })?;
        let cell = |i: usize| -> String {
            positions[i]
                .and_then(|p| row.get(p))
                .unwrap_or("")
                .to_string()
        };
        records.push(Record {
            date: cell(0),
            shift: cell(1),
            factory: cell(2),
            machine: cell(3),
            issue: cell(4),
            root_cause: cell(5),
            correction: cell(6),
            corrective_action: cell(7),
            reported_by: cell(8),
        });
    }

    Ok(RecordCollection::new(records))
}

/// Parse an incident log held in memory (e.g. an uploaded file body).
pub fn load_from_str(data: &str) -> NcResult<RecordCollection> {
    load_from_reader(data.as_bytes())
}

fn normalize_header(h: &str) -> String {
    h.trim_start_matches('\u{feff}').trim().to_ascii_lowercase()
}

/// Hex SHA-256 over the records, field by field, in order.
pub(crate) fn corpus_version(records: &[Record]) -> String {
    let mut hasher = Sha256::new();
    for r in records {
        for field in [
            &r.date,
            &r.shift,
            &r.factory,
            &r.machine,
            &r.issue,
            &r.root_cause,
            &r.correction,
            &r.corrective_action,
            &r.reported_by,
        ] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}
