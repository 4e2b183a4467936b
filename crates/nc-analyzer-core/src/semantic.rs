//! Dense retrieval over record embeddings.
//!
//! Both backends embed the same synthesized record text the lexical index
//! uses, but score differently:
//!
//! - **Remote**: one batch call for the records, one call for the query,
//!   then `cos(q, r)` with an epsilon-guarded denominator for every record.
//! - **Local**: nearest-neighbour search by cosine distance; the score is
//!   `1 − distance`.
//!
//! Embeddings are computed per request; nothing is cached between queries.

use crate::embedding::{cosine_similarity, nearest_neighbors, EmbeddingProvider};
use crate::error::{NcError, NcResult};
use crate::models::{RecordCollection, ScoredMatch};
use crate::rank::top_k_matches;

/// An embedding provider tagged with the retrieval strategy it serves.
#[derive(Clone, Copy)]
pub enum SemanticBackend<'a> {
    Remote(&'a dyn EmbeddingProvider),
    Local(&'a dyn EmbeddingProvider),
}

impl<'a> SemanticBackend<'a> {
    fn provider(&self) -> &'a dyn EmbeddingProvider {
        match self {
            SemanticBackend::Remote(p) | SemanticBackend::Local(p) => *p,
        }
    }

    /// Wrap a backend-side failure in the error kind this backend reports.
    fn error(&self, message: String) -> NcError {
        match self {
            SemanticBackend::Remote(_) => NcError::EmbeddingService(message),
            SemanticBackend::Local(_) => NcError::UnavailableBackend(message),
        }
    }
}

/// Embed the corpus and the query, then return the top-K matches.
///
/// An empty corpus or `top_k == 0` returns an empty list without touching
/// the backend.
pub async fn build_and_query(
    records: &RecordCollection,
    text: &str,
    top_k: usize,
    backend: SemanticBackend<'_>,
) -> NcResult<Vec<ScoredMatch>> {
    if records.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let provider = backend.provider();
    let texts = records.search_texts();
    let rows = provider.embed_texts(&texts).await?;
    if rows.len() != texts.len() {
        return Err(backend.error(format!(
            "expected {} record embeddings, got {}",
            texts.len(),
            rows.len()
        )));
    }

    let query = provider
        .embed_texts(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| backend.error("Empty embedding response".to_string()))?;

    if query.is_empty() {
        return Err(backend.error("query embedding is empty".to_string()));
    }
    if let Some((row, got)) = rows
        .iter()
        .enumerate()
        .map(|(i, r)| (i, r.len()))
        .find(|(_, len)| *len != query.len())
    {
        return Err(backend.error(format!(
            "embedding dimension mismatch: query has {}, record {} has {}",
            query.len(),
            row,
            got
        )));
    }

    tracing::debug!(
        model = provider.model_name(),
        records = rows.len(),
        dims = query.len(),
        "embedded corpus and query"
    );

    let matches = match backend {
        SemanticBackend::Remote(_) => {
            let scores: Vec<f64> = rows.iter().map(|r| cosine_similarity(&query, r)).collect();
            top_k_matches(records, &scores, top_k)
        }
        SemanticBackend::Local(_) => nearest_neighbors(&rows, &query, top_k.min(rows.len()))
            .into_iter()
            .filter_map(|(i, distance)| {
                records.get(i).map(|record| ScoredMatch {
                    index: i,
                    record: record.clone(),
                    score: 1.0 - distance,
                })
            })
            .collect(),
    };

    Ok(matches)
}
