//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that every dense backend
//! implements, plus the pure similarity helpers the semantic indexer uses.
//!
//! Concrete providers (OpenAI, fastembed) live in the `nc-analyzer` app
//! crate.

use async_trait::async_trait;

use crate::error::NcResult;

/// Added to the norm product so all-zero vectors score 0 instead of NaN.
pub const COSINE_EPSILON: f64 = 1e-12;

/// Trait for embedding providers.
///
/// Implementations report failures with the variant that matches their
/// recovery policy: remote services use [`crate::NcError::EmbeddingService`],
/// local models use [`crate::NcError::UnavailableBackend`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_texts(&self, texts: &[String]) -> NcResult<Vec<Vec<f32>>>;
}

/// Cosine similarity with an epsilon-guarded denominator:
///
/// ```text
///              a · b
/// sim = ─────────────────
///        ‖a‖ × ‖b‖ + ε
/// ```
///
/// Both vectors must have the same length; callers check this first.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let (dot, norm_a, norm_b) = dot_and_norms(a, b);
    dot / (norm_a * norm_b + COSINE_EPSILON)
}

/// Cosine distance `1 − cos(a, b)`. A zero vector is at distance `1.0`
/// from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let (dot, norm_a, norm_b) = dot_and_norms(a, b);
    let denom = norm_a * norm_b;
    if denom == 0.0 {
        return 1.0;
    }
    1.0 - dot / denom
}

fn dot_and_norms(a: &[f32], b: &[f32]) -> (f64, f64, f64) {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    (dot, norm_a.sqrt(), norm_b.sqrt())
}

/// Brute-force k-nearest neighbours by cosine distance.
///
/// Returns `(row, distance)` pairs sorted by ascending distance, ties in
/// row order, at most `k` long.
pub fn nearest_neighbors(rows: &[Vec<f32>], query: &[f32], k: usize) -> Vec<(usize, f64)> {
    let mut dists: Vec<(usize, f64)> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| (i, cosine_distance(query, row)))
        .collect();
    // NaN distances sort after every real one.
    dists.sort_by(|a, b| a.1.is_nan().cmp(&b.1.is_nan()).then(a.1.total_cmp(&b.1)));
    dists.truncate(k);
    dists
}
