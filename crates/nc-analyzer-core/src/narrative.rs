//! Root-cause narrative and CAPA synthesis.
//!
//! [`synthesize`] has two paths:
//!
//! - **Template** (no generative backend): a deterministic narrative that
//!   quotes the best historical root cause verbatim, plus a fixed-structure
//!   CAPA plan. Pure and total.
//! - **Generated**: one prompt built by [`build_prompt`] is sent to the
//!   [`GenerativeBackend`]; the trimmed completion fills *both*
//!   [`NarrativeResult`] fields. The two sections are not split apart.
//!
//! Callers that get [`NcError::Generation`] back fall back to
//! [`templated_narrative`] with [`TemplateReason::BackendFailed`].

use async_trait::async_trait;
use std::fmt::Write as _;

use crate::error::{NcError, NcResult};
use crate::models::{EvidenceBundle, NarrativeResult, ScoredMatch};

/// Root cause placeholder when no usable historical evidence exists.
pub const NOT_FOUND_SENTINEL: &str = "Not found in historical logs";

/// System message sent ahead of every generation prompt.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful quality assurance and process improvement assistant.";

/// A text-completion service used to write the narrative.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Complete `prompt` under `system`. Failures are [`NcError::Generation`].
    async fn complete(&self, system: &str, prompt: &str) -> NcResult<String>;
}

/// Why the templated path was taken; only changes the leading marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateReason {
    NoBackend,
    BackendFailed,
}

impl TemplateReason {
    fn narrative_marker(self) -> &'static str {
        match self {
            TemplateReason::NoBackend => "[No LLM key provided]",
            TemplateReason::BackendFailed => "[LLM unavailable]",
        }
    }

    fn capa_marker(self) -> &'static str {
        match self {
            TemplateReason::NoBackend => "[No LLM key]",
            TemplateReason::BackendFailed => "[LLM unavailable]",
        }
    }
}

/// Everything the generation prompt is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub reported_issue: String,
    pub observed_root_cause: String,
    pub evidence: String,
    pub factory: String,
    pub machine: String,
    pub shift: String,
    pub additional_notes: String,
}

impl PromptContext {
    pub fn from_bundle(bundle: &EvidenceBundle) -> Self {
        let ctx = &bundle.context;
        let issue = ctx.issue.trim();
        Self {
            reported_issue: if issue.is_empty() {
                "N/A".to_string()
            } else {
                ctx.issue.clone()
            },
            observed_root_cause: observed_root_cause(bundle).to_string(),
            evidence: evidence_text(&bundle.matches),
            factory: ctx.factory.clone(),
            machine: ctx.machine.clone(),
            shift: ctx.shift.to_string(),
            additional_notes: ctx.notes().to_string(),
        }
    }
}

/// Best historical root cause, or [`NOT_FOUND_SENTINEL`].
pub fn observed_root_cause(bundle: &EvidenceBundle) -> &str {
    bundle.best_root_cause().unwrap_or(NOT_FOUND_SENTINEL)
}

/// Human-readable evidence block, one paragraph per match.
///
/// ```text
/// Result 1 | date: 2024-01-02 , shift: Day, factory: Line1, machine: PressA
/// Issue: burr on edge
/// Root cause: dull die
/// Correction: deburr
/// Corrective action: replace die
/// ```
pub fn evidence_text(matches: &[ScoredMatch]) -> String {
    let mut out = String::new();
    for (i, m) in matches.iter().enumerate() {
        let r = &m.record;
        let _ = write!(
            out,
            "Result {} | date: {} , shift: {}, factory: {}, machine: {}\n\
             Issue: {}\nRoot cause: {}\nCorrection: {}\nCorrective action: {}\n\n",
            i + 1,
            r.date,
            r.shift,
            r.factory,
            r.machine,
            r.issue,
            r.root_cause,
            r.correction,
            r.corrective_action
        );
    }
    out
}

/// The single structured prompt sent to the generative backend.
pub fn build_prompt(ctx: &PromptContext) -> String {
    format!(
        "You are a Quality Assurance expert. Given the information below, expand the root cause \
         into a clear, thorough narrative (3-6 sentences),\n\
         identify immediate corrections, and produce a CAPA plan with: objective, short-term \
         corrective actions, root cause analysis (5 whys), preventive actions,\n\
         owners, timeline (short-term and long-term), and metrics to verify effectiveness.\n\
         \n\
         Context:\n\
         Reported issue: {}\n\
         Observed root cause (from history): {}\n\
         Evidence: {}\n\
         Factory: {}\n\
         Machine: {}\n\
         Shift: {}\n\
         Additional notes: {}\n",
        ctx.reported_issue,
        ctx.observed_root_cause,
        ctx.evidence,
        ctx.factory,
        ctx.machine,
        ctx.shift,
        ctx.additional_notes
    )
}

/// Deterministic narrative and CAPA plan built from the best match.
pub fn templated_narrative(bundle: &EvidenceBundle, reason: TemplateReason) -> NarrativeResult {
    let root_cause = observed_root_cause(bundle);

    let expanded_root_cause = format!(
        "{} Observed root cause: {}. Recommended to investigate operator procedures, \
         check recent maintenance, and validate recipes.",
        reason.narrative_marker(),
        root_cause
    );

    let capa = format!(
        "{} CAPA for observed root cause \"{}\": \
         1) Immediate: Stop production, segregate affected batches. \
         2) Short-term: Repair/replace faulty parts. \
         3) Preventive: Update SOPs, retrain staff. \
         Owner: QA Manager. Timeline: immediate -> 1 week -> 1 month. KPI: rework rate.",
        reason.capa_marker(),
        root_cause
    );

    NarrativeResult {
        expanded_root_cause,
        capa,
    }
}

/// Produce the narrative for `bundle`.
///
/// Without a backend this is [`templated_narrative`] and cannot fail. With
/// a backend, its failure is returned as [`NcError::Generation`] for the
/// caller to degrade.
pub async fn synthesize(
    bundle: &EvidenceBundle,
    backend: Option<&dyn GenerativeBackend>,
) -> NcResult<NarrativeResult> {
    let Some(backend) = backend else {
        return Ok(templated_narrative(bundle, TemplateReason::NoBackend));
    };

    let prompt = build_prompt(&PromptContext::from_bundle(bundle));
    let text = backend
        .complete(SYSTEM_PROMPT, &prompt)
        .await
        .map_err(|e| match e {
            NcError::Generation(_) => e,
            other => NcError::Generation(other.to_string()),
        })?;
    let text = text.trim().to_string();

    tracing::info!(model = backend.model_name(), chars = text.len(), "generated narrative");

    Ok(NarrativeResult {
        expanded_root_cause: text.clone(),
        capa: text,
    })
}
