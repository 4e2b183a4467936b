//! `ncx search`: rank the log against a free-text query.

use anyhow::{bail, Result};
use nc_analyzer_core::rank::RequestedMode;

use crate::analyze::Analyzer;
use crate::config::{Config, Credential};

pub async fn run_search(
    config: Config,
    credential: Option<Credential>,
    query: &str,
    mode: Option<String>,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    if top_k == Some(0) {
        bail!("--top-k must be >= 1");
    }
    let requested = mode
        .as_deref()
        .map(str::parse::<RequestedMode>)
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let mut analyzer = Analyzer::from_config(config, credential)?;
    let outcome = analyzer.search(query, top_k, requested).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.results.is_empty() {
        println!("No close matches found in the log.");
        return Ok(());
    }

    println!("Mode: {}", outcome.mode);
    for (i, r) in outcome.results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} | {} | {} | {}",
            i + 1,
            r.score,
            r.date,
            r.factory,
            r.machine,
            r.issue
        );
        println!("    root cause: {}", r.root_cause);
        if !r.corrective_action.is_empty() {
            println!("    corrective action: {}", r.corrective_action);
        }
    }
    Ok(())
}
