//! Record store: loads the NC log CSV from disk.

use anyhow::Result;
use nc_analyzer_core::models::RecordCollection;
use nc_analyzer_core::records::load_from_reader;
use nc_analyzer_core::{NcError, NcResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::config::Config;

/// Read every record in `path`. An unreadable file or a file without a
/// header row is a [`NcError::DataSource`].
pub fn load_records(path: &Path) -> NcResult<RecordCollection> {
    let file = File::open(path).map_err(|e| {
        NcError::DataSource(format!("cannot open {}: {}", path.display(), e))
    })?;
    let records = load_from_reader(BufReader::new(file)).map_err(|e| match e {
        NcError::DataSource(msg) => NcError::DataSource(format!("{}: {}", path.display(), msg)),
        other => other,
    })?;

    tracing::info!(
        path = %path.display(),
        records = records.len(),
        version = records.version(),
        "loaded records"
    );
    Ok(records)
}

/// `ncx records`: print a summary of the configured log.
pub fn run_records(config: &Config) -> Result<()> {
    let records = load_records(&config.data.csv_path)?;

    println!("Source:   {}", config.data.csv_path.display());
    println!("Records:  {}", records.len());
    println!("Version:  {}", records.version());

    if records.is_empty() {
        return Ok(());
    }

    println!();
    println!("{:<12} {:<8} {:<14} {:<14} ISSUE", "DATE", "SHIFT", "FACTORY", "MACHINE");
    for r in records.records() {
        println!(
            "{:<12} {:<8} {:<14} {:<14} {}",
            r.date, r.shift, r.factory, r.machine, r.issue
        );
    }
    Ok(())
}
