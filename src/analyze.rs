//! Request boundary: one search plus one narrative per analysis.
//!
//! [`Analyzer::search`] returns ranking failures as typed errors.
//! [`Analyzer::analyze`] never fails: a ranking failure becomes an empty
//! evidence list with [`SearchStatus::Failed`], and a generation failure
//! becomes the templated narrative.
//!
//! Either way, a semantic backend that fails is retired for the rest of the
//! process, so the next request resolves remote → local → lexical.

use anyhow::Result;
use chrono::{DateTime, Local};
use nc_analyzer_core::models::{
    EvidenceBundle, EvidenceRow, NarrativeResult, QueryContext, RecordCollection,
};
use nc_analyzer_core::narrative::{
    evidence_text, synthesize, templated_narrative, GenerativeBackend, TemplateReason,
};
use nc_analyzer_core::rank::{select_mode, RankMode, RequestedMode};
use nc_analyzer_core::{NcError, NcResult};
use serde::Serialize;
use std::path::PathBuf;

use crate::config::{Config, Credential};
use crate::generation::create_generator;
use crate::ranker::Ranker;
use crate::store::load_records;

/// Outcome of the search step of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchStatus {
    Matched { count: usize },
    NoMatches,
    /// The backend failed; distinct from a search that found nothing.
    Failed { kind: String, message: String },
}

/// Where the narrative text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeSource {
    Generated,
    Template,
    TemplateAfterFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptMessage {
    pub role: String,
    pub text: String,
}

/// Everything a renderer needs for one analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub id: String,
    pub timestamp: String,
    pub generated_at: DateTime<Local>,
    pub context: QueryContext,
    pub mode: RankMode,
    pub search: SearchStatus,
    pub evidence: Vec<EvidenceRow>,
    pub evidence_text: String,
    #[serde(flatten)]
    pub narrative: NarrativeResult,
    pub narrative_source: NarrativeSource,
    pub transcript: Vec<TranscriptMessage>,
}

/// Result of a bare search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub mode: RankMode,
    pub results: Vec<EvidenceRow>,
}

pub struct Analyzer {
    config: Config,
    records: RecordCollection,
    ranker: Ranker,
    generator: Option<Box<dyn GenerativeBackend>>,
}

impl Analyzer {
    pub fn new(
        config: Config,
        records: RecordCollection,
        ranker: Ranker,
        generator: Option<Box<dyn GenerativeBackend>>,
    ) -> Self {
        Self {
            config,
            records,
            ranker,
            generator,
        }
    }

    /// Load the configured log and build every backend the credential allows.
    pub fn from_config(config: Config, credential: Option<Credential>) -> Result<Self> {
        let records = load_records(&config.data.csv_path)?;
        let ranker = Ranker::from_config(&config.embedding, credential.as_ref())?;
        let generator = create_generator(&config.generation, credential.as_ref())?;
        Ok(Self::new(config, records, ranker, generator))
    }

    pub fn records(&self) -> &RecordCollection {
        &self.records
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve the backend for a request, defaulting to the configured mode.
    pub fn mode(&self, requested: Option<RequestedMode>) -> RankMode {
        let requested = requested
            .or_else(|| self.config.retrieval.requested_mode().ok())
            .unwrap_or_default();
        select_mode(requested, self.ranker.has_remote(), self.ranker.has_local())
    }

    pub async fn search(
        &mut self,
        query: &str,
        top_k: Option<usize>,
        requested: Option<RequestedMode>,
    ) -> NcResult<SearchOutcome> {
        let mode = self.mode(requested);
        let top_k = top_k.unwrap_or(self.config.retrieval.top_k);
        let ranked = self.ranker.rank(&self.records, query, top_k, mode).await;
        let matches = match ranked {
            Ok(m) => m,
            Err(e) => {
                self.fall_back_after(mode, &e);
                return Err(e);
            }
        };
        Ok(SearchOutcome {
            mode,
            results: matches.iter().map(EvidenceRow::from).collect(),
        })
    }

    pub async fn analyze(&mut self, context: QueryContext) -> AnalysisReport {
        let generated_at = Local::now();
        let mode = self.mode(None);
        let query = context.query_text();

        let ranked = self
            .ranker
            .rank(&self.records, &query, self.config.retrieval.top_k, mode)
            .await;
        let (matches, search) = match ranked {
            Ok(m) if m.is_empty() => (m, SearchStatus::NoMatches),
            Ok(m) => {
                let count = m.len();
                (m, SearchStatus::Matched { count })
            }
            Err(e) => {
                tracing::warn!(%mode, error = %e, "search failed, continuing without evidence");
                self.fall_back_after(mode, &e);
                (
                    Vec::new(),
                    SearchStatus::Failed {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    },
                )
            }
        };

        let bundle = EvidenceBundle { matches, context };

        let (narrative, narrative_source) = match self.generator.as_deref() {
            None => (
                templated_narrative(&bundle, TemplateReason::NoBackend),
                NarrativeSource::Template,
            ),
            Some(backend) => match synthesize(&bundle, Some(backend)).await {
                Ok(n) => (n, NarrativeSource::Generated),
                Err(e) => {
                    tracing::warn!(error = %e, "generation failed, using template");
                    (
                        templated_narrative(&bundle, TemplateReason::BackendFailed),
                        NarrativeSource::TemplateAfterFailure,
                    )
                }
            },
        };

        let transcript = build_transcript(&bundle.context, &narrative);
        let EvidenceBundle { matches, context } = bundle;

        AnalysisReport {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            generated_at,
            context,
            mode,
            search,
            evidence: matches.iter().map(EvidenceRow::from).collect(),
            evidence_text: evidence_text(&matches),
            narrative,
            narrative_source,
            transcript,
        }
    }

    /// Retire the backend behind `mode` after a recoverable failure.
    fn fall_back_after(&mut self, mode: RankMode, err: &NcError) {
        if err.is_degradable() && self.ranker.retire(mode) {
            tracing::warn!(
                failed = %mode,
                next = %self.mode(None),
                "semantic backend retired for later requests"
            );
        }
    }

    /// Swap in a new corpus and drop indices built from the old one.
    pub fn replace_records(&mut self, records: RecordCollection) {
        self.records = records;
        self.ranker.invalidate();
    }

    /// Re-read the configured log. On failure the current corpus is kept.
    pub fn reload(&mut self) -> NcResult<usize> {
        let records = load_records(&self.config.data.csv_path)?;
        let count = records.len();
        self.replace_records(records);
        Ok(count)
    }
}

fn build_transcript(context: &QueryContext, narrative: &NarrativeResult) -> Vec<TranscriptMessage> {
    vec![
        TranscriptMessage {
            role: "user".to_string(),
            text: format!(
                "Shift: {}\nFactory: {}\nMachine: {}\nIssue: {}\nNotes: {}",
                context.shift,
                context.factory,
                context.machine,
                context.issue,
                context.notes()
            ),
        },
        TranscriptMessage {
            role: "assistant".to_string(),
            text: format!(
                "Expanded Root Cause:\n{}\n\nCAPA:\n{}",
                narrative.expanded_root_cause, narrative.capa
            ),
        },
    ]
}

/// `ncx analyze`: run the full pipeline and print or save the report.
pub async fn run_analyze(
    config: Config,
    credential: Option<Credential>,
    context: QueryContext,
    pdf: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mut analyzer = Analyzer::from_config(config, credential)?;
    let report = analyzer.analyze(context).await;

    if let Some(path) = pdf {
        let path = if path.is_dir() {
            path.join(crate::report::default_file_name(&report))
        } else {
            path
        };
        let bytes = crate::report::render_pdf(&report)?;
        std::fs::write(&path, bytes)?;
        eprintln!("Wrote {}", path.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Mode: {}", report.mode);
    println!();
    println!("Matching historical incidents");
    match &report.search {
        SearchStatus::Failed { message, .. } => println!("Search error: {}", message),
        SearchStatus::NoMatches => println!("No close matches found in the log."),
        SearchStatus::Matched { .. } => print!("{}", report.evidence_text),
    }
    println!();
    println!("Expanded Root Cause");
    println!("{}", report.narrative.expanded_root_cause);
    println!();
    println!("Suggested CAPA (Corrective & Preventive Actions)");
    println!("{}", report.narrative.capa);
    Ok(())
}
