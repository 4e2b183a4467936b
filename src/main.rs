//! # NC Analyzer CLI (`ncx`)
//!
//! ## Usage
//!
//! ```bash
//! ncx --config ./config/ncx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ncx records` | Load the incident log and list it |
//! | `ncx search "<query>"` | Rank past incidents against a query |
//! | `ncx analyze ...` | Match a new incident and draft root cause + CAPA |
//! | `ncx serve` | Start the HTTP server |
//!
//! A missing config file is not an error; defaults are used.

use clap::{Parser, Subcommand};
use nc_analyzer::analyze::{run_analyze, Analyzer};
use nc_analyzer::config;
use nc_analyzer_core::models::{QueryContext, Shift};
use nc_analyzer::{logging, search, server, store};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ncx",
    version,
    about = "NC Analyzer: match non-conformance incidents and draft CAPA plans",
    long_about = "NC Analyzer matches a newly reported non-conformance against a CSV log of \
    past incidents (TF-IDF or embeddings), then drafts an expanded root cause and a CAPA plan \
    with a chat model or a fixed template."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ncx.toml")]
    config: PathBuf,

    /// API key for the embedding and chat services. Overrides the
    /// environment variable named in `[credentials].api_key_env`.
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the incident log and print its records.
    Records,

    /// Rank past incidents against a free-text query.
    Search {
        /// Query text.
        query: String,

        /// `lexical` or `semantic`. Defaults to `[retrieval].mode`.
        #[arg(long)]
        mode: Option<String>,

        /// Number of results. Defaults to `[retrieval].top_k`.
        #[arg(long)]
        top_k: Option<usize>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Match a new incident and draft the root cause narrative and CAPA plan.
    Analyze {
        #[arg(long)]
        factory: String,

        #[arg(long)]
        machine: String,

        /// Day, Swing, or Night.
        #[arg(long, default_value = "Day")]
        shift: Shift,

        /// Short issue description.
        #[arg(long)]
        issue: String,

        /// Additional context.
        #[arg(long)]
        notes: Option<String>,

        /// Write a PDF report to this file (or into this directory).
        #[arg(long)]
        pdf: Option<PathBuf>,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let cfg = config::load_or_minimal(&cli.config)?;
    let credential = cfg.resolve_credential(cli.api_key.as_deref());

    match cli.command {
        Commands::Records => {
            store::run_records(&cfg)?;
        }
        Commands::Search {
            query,
            mode,
            top_k,
            json,
        } => {
            search::run_search(cfg, credential, &query, mode, top_k, json).await?;
        }
        Commands::Analyze {
            factory,
            machine,
            shift,
            issue,
            notes,
            pdf,
            json,
        } => {
            let context = QueryContext {
                factory,
                machine,
                shift,
                issue,
                additional_notes: notes.filter(|n| !n.trim().is_empty()),
            };
            run_analyze(cfg, credential, context, pdf, json).await?;
        }
        Commands::Serve => {
            let analyzer = Analyzer::from_config(cfg, credential)?;
            server::run_server(analyzer).await?;
        }
    }

    Ok(())
}
