//! Core data models for NC Analyzer.
//!
//! These types represent the incident records, query context, ranked
//! evidence, and narrative output that flow through the analysis pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Production shift during which an incident was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Shift {
    #[default]
    Day,
    Swing,
    Night,
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Shift::Day => "Day",
            Shift::Swing => "Swing",
            Shift::Night => "Night",
        };
        f.write_str(s)
    }
}

impl FromStr for Shift {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Shift::Day),
            "swing" => Ok(Shift::Swing),
            "night" => Ok(Shift::Night),
            other => Err(format!(
                "unknown shift '{}': expected Day, Swing, or Night",
                other
            )),
        }
    }
}

/// One historical non-conformance entry.
///
/// Every field is text; absent values are the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub date: String,
    pub shift: String,
    pub factory: String,
    pub machine: String,
    pub issue: String,
    pub root_cause: String,
    pub correction: String,
    pub corrective_action: String,
    pub reported_by: String,
}

impl Record {
    /// The text both indexers score against: factory, machine, issue, and
    /// root cause joined with single spaces.
    pub fn search_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.factory, self.machine, self.issue, self.root_cause
        )
    }
}

/// The loaded incident log in file order, tagged with a content version.
///
/// `version` is a SHA-256 over every field of every record; two collections
/// with the same rows in the same order share a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCollection {
    records: Vec<Record>,
    version: String,
}

impl RecordCollection {
    pub fn new(records: Vec<Record>) -> Self {
        let version = crate::records::corpus_version(&records);
        Self { records, version }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Content version used to key derived indices.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Synthesized search text for every record, in order.
    pub fn search_texts(&self) -> Vec<String> {
        self.records.iter().map(Record::search_text).collect()
    }
}

/// What the user reports about a new incident.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default)]
    pub factory: String,
    #[serde(default)]
    pub machine: String,
    #[serde(default)]
    pub shift: Shift,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

impl QueryContext {
    /// The search query: factory, machine, issue, and notes joined with spaces.
    pub fn query_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.factory,
            self.machine,
            self.issue,
            self.notes()
        )
    }

    /// Additional notes, or `""` when none were given.
    pub fn notes(&self) -> &str {
        self.additional_notes.as_deref().unwrap_or("")
    }
}

/// A record with its similarity to the query (higher is better).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    /// Position of the record in its [`RecordCollection`].
    pub index: usize,
    pub record: Record,
    pub score: f64,
}

/// Ranked evidence plus the context that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceBundle {
    pub matches: Vec<ScoredMatch>,
    pub context: QueryContext,
}

impl EvidenceBundle {
    /// Root cause of the best match, if there is one and it is not blank.
    pub fn best_root_cause(&self) -> Option<&str> {
        self.matches
            .first()
            .map(|m| m.record.root_cause.as_str())
            .filter(|rc| !rc.trim().is_empty())
    }
}

/// Expanded root cause and CAPA plan for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeResult {
    pub expanded_root_cause: String,
    pub capa: String,
}

/// One ranked row in the shape the report renderer consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRow {
    pub date: String,
    pub shift: String,
    pub factory: String,
    pub machine: String,
    pub issue: String,
    pub root_cause: String,
    pub correction: String,
    pub corrective_action: String,
    pub score: f64,
}

impl From<&ScoredMatch> for EvidenceRow {
    fn from(m: &ScoredMatch) -> Self {
        let r = &m.record;
        Self {
            date: r.date.clone(),
            shift: r.shift.clone(),
            factory: r.factory.clone(),
            machine: r.machine.clone(),
            issue: r.issue.clone(),
            root_cause: r.root_cause.clone(),
            correction: r.correction.clone(),
            corrective_action: r.corrective_action.clone(),
            score: m.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_text_joins_four_fields() {
        let r = Record {
            factory: "Line1".into(),
            machine: "PressA".into(),
            issue: "burr on edge".into(),
            root_cause: "dull die".into(),
            reported_by: "ignored".into(),
            ..Default::default()
        };
        assert_eq!(r.search_text(), "Line1 PressA burr on edge dull die");
    }

    #[test]
    fn test_query_text_without_notes() {
        let ctx = QueryContext {
            factory: "F1".into(),
            machine: "M2".into(),
            shift: Shift::Night,
            issue: "scratch".into(),
            additional_notes: None,
        };
        assert_eq!(ctx.query_text(), "F1 M2 scratch ");
    }

    #[test]
    fn test_shift_parse_is_case_insensitive() {
        assert_eq!("night".parse::<Shift>().unwrap(), Shift::Night);
        assert_eq!(" Swing ".parse::<Shift>().unwrap(), Shift::Swing);
        assert!("graveyard".parse::<Shift>().is_err());
    }

    #[test]
    fn test_evidence_row_excludes_reporter() {
        let m = ScoredMatch {
            index: 0,
            record: Record {
                reported_by: "alice".into(),
                ..Default::default()
            },
            score: 0.5,
        };
        let json = serde_json::to_value(EvidenceRow::from(&m)).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys.len(),
            9,
            "unexpected evidence row fields: {:?}",
            keys
        );
        assert!(json.get("reported_by").is_none());
        assert_eq!(json["score"], 0.5);
    }

    #[test]
    fn test_best_root_cause_skips_blank() {
        let bundle = EvidenceBundle {
            matches: vec![ScoredMatch {
                index: 0,
                record: Record {
                    root_cause: "  ".into(),
                    ..Default::default()
                },
                score: 1.0,
            }],
            context: QueryContext::default(),
        };
        assert_eq!(bundle.best_root_cause(), None);
    }
}
