//! Ranking modes, backend selection policy, and deterministic top-K.
//!
//! All three retrieval paths funnel their per-record scores through
//! [`top_k_matches`], so every mode shares one ordering rule:
//!
//! 1. Sort by score, descending.
//! 2. Ties keep original record order (stable sort).
//! 3. Truncate to `min(top_k, n)`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{RecordCollection, ScoredMatch};

/// Number of matches returned when the caller does not say otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// What the operator asked for in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedMode {
    #[default]
    Lexical,
    Semantic,
}

impl FromStr for RequestedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lexical" | "keyword" => Ok(RequestedMode::Lexical),
            "semantic" => Ok(RequestedMode::Semantic),
            other => Err(format!(
                "Unknown search mode: {}. Use lexical or semantic.",
                other
            )),
        }
    }
}

/// The concrete backend a single request is ranked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankMode {
    Lexical,
    SemanticRemote,
    SemanticLocal,
}

impl fmt::Display for RankMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RankMode::Lexical => "lexical",
            RankMode::SemanticRemote => "semantic-remote",
            RankMode::SemanticLocal => "semantic-local",
        })
    }
}

/// Resolve the backend for a request. This is the only place backend
/// choice is made; rankers never switch backends after the fact.
///
/// | requested | credential | local model built in | result |
/// |-----------|------------|----------------------|--------|
/// | semantic  | yes        | any                  | `SemanticRemote` |
/// | semantic  | no         | yes                  | `SemanticLocal` |
/// | semantic  | no         | no                   | `Lexical` |
/// | lexical   | any        | any                  | `Lexical` |
pub fn select_mode(requested: RequestedMode, has_credential: bool, local_available: bool) -> RankMode {
    match (requested, has_credential, local_available) {
        (RequestedMode::Semantic, true, _) => RankMode::SemanticRemote,
        (RequestedMode::Semantic, false, true) => RankMode::SemanticLocal,
        _ => RankMode::Lexical,
    }
}

/// Turn one score per record into the ordered top-K match list.
///
/// `scores[i]` must belong to `records[i]`. NaN scores sort last.
pub fn top_k_matches(records: &RecordCollection, scores: &[f64], top_k: usize) -> Vec<ScoredMatch> {
    let mut order: Vec<usize> = (0..scores.len().min(records.len())).collect();
    order.sort_by(|&a, &b| compare_desc(scores[a], scores[b]));
    order.truncate(top_k);

    order
        .into_iter()
        .filter_map(|i| {
            records.get(i).map(|record| ScoredMatch {
                index: i,
                record: record.clone(),
                score: scores[i],
            })
        })
        .collect()
}

fn compare_desc(a: f64, b: f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn corpus(n: usize) -> RecordCollection {
        RecordCollection::new(
            (0..n)
                .map(|i| Record {
                    issue: format!("issue {}", i),
                    ..Default::default()
                })
                .collect(),
        )
    }

    #[test]
    fn test_select_mode_table() {
        use RequestedMode::*;
        assert_eq!(select_mode(Semantic, true, true), RankMode::SemanticRemote);
        assert_eq!(select_mode(Semantic, true, false), RankMode::SemanticRemote);
        assert_eq!(select_mode(Semantic, false, true), RankMode::SemanticLocal);
        assert_eq!(select_mode(Semantic, false, false), RankMode::Lexical);
        assert_eq!(select_mode(Lexical, true, true), RankMode::Lexical);
        assert_eq!(select_mode(Lexical, false, false), RankMode::Lexical);
    }

    #[test]
    fn test_top_k_sorted_desc() {
        let c = corpus(4);
        let got = top_k_matches(&c, &[0.1, 0.9, 0.5, 0.7], 3);
        let idx: Vec<usize> = got.iter().map(|m| m.index).collect();
        assert_eq!(idx, vec![1, 3, 2]);
    }

    #[test]
    fn test_ties_keep_file_order() {
        let c = corpus(5);
        let got = top_k_matches(&c, &[0.0; 5], 3);
        let idx: Vec<usize> = got.iter().map(|m| m.index).collect();
        assert_eq!(idx, vec![0, 1, 2]);
    }

    #[test]
    fn test_k_larger_than_corpus() {
        let c = corpus(2);
        assert_eq!(top_k_matches(&c, &[0.3, 0.4], 10).len(), 2);
    }

    #[test]
    fn test_nan_sorts_last() {
        let c = corpus(3);
        let got = top_k_matches(&c, &[f64::NAN, 0.2, 0.1], 3);
        assert_eq!(got[2].index, 0);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("semantic".parse::<RequestedMode>().unwrap(), RequestedMode::Semantic);
        assert_eq!("keyword".parse::<RequestedMode>().unwrap(), RequestedMode::Lexical);
        assert!("hybrid".parse::<RequestedMode>().is_err());
    }
}
