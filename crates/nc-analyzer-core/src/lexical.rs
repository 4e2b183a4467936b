//! Sparse lexical retrieval: TF-IDF over unigrams and bigrams.
//!
//! # Weighting
//!
//! ```text
//! tokens   = lowercase runs of [alnum_] with len >= 2, minus stop words
//! terms    = tokens ∪ { "t_i t_i+1" }
//! idf(t)   = ln((1 + n) / (1 + df(t))) + 1
//! w(d, t)  = count(d, t) × idf(t), row L2-normalized
//! score    = w(query) · w(record)          (cosine)
//! ```
//!
//! The query is projected through the vocabulary fitted on the corpus, so
//! unknown terms simply contribute nothing.
//!
//! [`LexicalCache`] holds the most recently built index under a caller
//! supplied key. It never inspects the corpus itself; callers key it by
//! [`RecordCollection::version`] or call [`LexicalCache::invalidate`].

use std::collections::HashMap;

use crate::models::{RecordCollection, ScoredMatch};
use crate::rank::top_k_matches;
use crate::stop_words::is_stop_word;

/// Split text into lowercase word tokens of two or more characters,
/// dropping stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in lower.chars().chain(std::iter::once(' ')) {
        if ch.is_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            if current.chars().count() >= 2 && !is_stop_word(&current) {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }

    tokens
}

/// Unigrams followed by adjacent-pair bigrams.
pub fn analyze(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut terms = Vec::with_capacity(tokens.len() * 2);
    for pair in tokens.windows(2) {
        terms.push(format!("{} {}", pair[0], pair[1]));
    }
    let mut out = tokens;
    out.append(&mut terms);
    out
}

/// A sparse, L2-normalized term vector: `(term_id, weight)` sorted by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (a, wa) = self.entries[i];
            let (b, wb) = other.entries[j];
            match a.cmp(&b) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += wa * wb;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// Vocabulary and IDF weights fitted on a corpus.
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Fit on `docs` and return the vectorizer with each document's vector.
    pub fn fit_transform(docs: &[String]) -> (Self, Vec<SparseVector>) {
        let analyzed: Vec<Vec<String>> = docs.iter().map(|d| analyze(d)).collect();

        // Term ids are assigned in sorted term order so the index layout
        // does not depend on hash iteration order.
        let mut terms: Vec<&str> = analyzed
            .iter()
            .flat_map(|d| d.iter().map(String::as_str))
            .collect();
        terms.sort_unstable();
        terms.dedup();
        let vocabulary: HashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(id, t)| (t.to_string(), id))
            .collect();

        let mut df = vec![0usize; vocabulary.len()];
        for doc in &analyzed {
            let mut seen: Vec<usize> = doc.iter().map(|t| vocabulary[t]).collect();
            seen.sort_unstable();
            seen.dedup();
            for id in seen {
                df[id] += 1;
            }
        }

        let n = docs.len() as f64;
        let idf = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        let vectorizer = Self { vocabulary, idf };
        let rows = analyzed
            .iter()
            .map(|terms| vectorizer.weigh(terms))
            .collect();
        (vectorizer, rows)
    }

    /// Project text through the fitted vocabulary.
    pub fn transform(&self, text: &str) -> SparseVector {
        self.weigh(&analyze(text))
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    fn weigh(&self, terms: &[String]) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for t in terms {
            if let Some(&id) = self.vocabulary.get(t) {
                *counts.entry(id).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(id, tf)| (id, tf * self.idf[id]))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);

        let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in entries.iter_mut() {
                *w /= norm;
            }
        }

        SparseVector { entries }
    }
}

/// TF-IDF index over a record collection; row `i` is record `i`.
#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    vectorizer: TfidfVectorizer,
    rows: Vec<SparseVector>,
}

impl LexicalIndex {
    pub fn build(records: &RecordCollection) -> Self {
        let (vectorizer, rows) = TfidfVectorizer::fit_transform(&records.search_texts());
        tracing::info!(
            records = records.len(),
            vocabulary = vectorizer.vocabulary_len(),
            "built lexical index"
        );
        Self { vectorizer, rows }
    }

    /// Cosine score of `text` against every row.
    pub fn scores(&self, text: &str) -> Vec<f64> {
        let q = self.vectorizer.transform(text);
        self.rows.iter().map(|row| q.dot(row)).collect()
    }

    /// Ranked top-K matches for `text`. `records` must be the collection
    /// this index was built from.
    pub fn query(&self, records: &RecordCollection, text: &str, top_k: usize) -> Vec<ScoredMatch> {
        let scores = self.scores(text);
        top_k_matches(records, &scores, top_k)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vectorizer.vocabulary_len()
    }
}

/// Holds the most recently built [`LexicalIndex`] under one key.
#[derive(Debug, Default)]
pub struct LexicalCache {
    slot: Option<(String, LexicalIndex)>,
}

impl LexicalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached index for `key`, building it from `records` when
    /// the slot is empty or holds a different key.
    pub fn get_or_build(&mut self, key: &str, records: &RecordCollection) -> &LexicalIndex {
        if self.contains(key) {
            tracing::debug!(key, "lexical cache hit");
        } else {
            self.slot = None;
        }
        let (_, index) = self
            .slot
            .get_or_insert_with(|| (key.to_string(), LexicalIndex::build(records)));
        index
    }

    pub fn contains(&self, key: &str) -> bool {
        matches!(&self.slot, Some((k, _)) if k == key)
    }

    pub fn invalidate(&mut self) {
        if self.slot.take().is_some() {
            tracing::info!("lexical index cache invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn rec(factory: &str, machine: &str, issue: &str, root_cause: &str) -> Record {
        Record {
            factory: factory.into(),
            machine: machine.into(),
            issue: issue.into(),
            root_cause: root_cause.into(),
            ..Default::default()
        }
    }

    fn sample() -> RecordCollection {
        RecordCollection::new(vec![
            rec("Line1", "PressA", "burr on edge", "dull die"),
            rec("Line2", "Welder3", "porosity in weld seam", "contaminated shielding gas"),
            rec("Line1", "Lathe", "surface chatter marks", "loose tool holder"),
            rec("Line3", "PressB", "cracked flange after forming", "wrong material temper"),
            rec("Line2", "Painter", "orange peel finish", "paint viscosity too high"),
        ])
    }

    #[test]
    fn test_tokenize_drops_short_and_stop_words() {
        assert_eq!(tokenize("A burr on THE edge, x 2mm"), vec!["burr", "edge", "2mm"]);
    }

    #[test]
    fn test_analyze_adds_bigrams_after_stop_word_removal() {
        let terms = analyze("burr on edge");
        assert_eq!(terms, vec!["burr", "edge", "burr edge"]);
    }

    #[test]
    fn test_single_record_scenario() {
        let c = RecordCollection::new(vec![rec("Line1", "PressA", "burr on edge", "dull die")]);
        let index = LexicalIndex::build(&c);
        let got = index.query(&c, "Line1 PressA burr", 5);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].index, 0);
        assert!(got[0].score > 0.0);
    }

    #[test]
    fn test_best_match_ranks_first() {
        let c = sample();
        let index = LexicalIndex::build(&c);
        let got = index.query(&c, "weld porosity", 3);
        assert_eq!(got[0].index, 1);
    }

    #[test]
    fn test_count_sorted_and_unique() {
        let c = sample();
        let index = LexicalIndex::build(&c);
        for k in 0..=7 {
            let got = index.query(&c, "Line1 press edge", k);
            assert_eq!(got.len(), k.min(c.len()));
            for w in got.windows(2) {
                assert!(w[0].score >= w[1].score);
            }
            let mut idx: Vec<usize> = got.iter().map(|m| m.index).collect();
            idx.sort_unstable();
            idx.dedup();
            assert_eq!(idx.len(), got.len());
        }
    }

    #[test]
    fn test_zero_overlap_returns_file_order_with_zero_scores() {
        let c = sample();
        let index = LexicalIndex::build(&c);
        let got = index.query(&c, "zzzz qqqq", 3);
        assert_eq!(got.iter().map(|m| m.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(got.iter().all(|m| m.score == 0.0));
    }

    #[test]
    fn test_empty_corpus() {
        let c = RecordCollection::empty();
        let index = LexicalIndex::build(&c);
        assert!(index.is_empty());
        assert!(index.query(&c, "anything", 5).is_empty());
    }

    #[test]
    fn test_all_stop_word_corpus_scores_zero() {
        let c = RecordCollection::new(vec![rec("the", "of", "and", "a")]);
        let index = LexicalIndex::build(&c);
        assert_eq!(index.vocabulary_len(), 0);
        let got = index.query(&c, "the", 5);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].score, 0.0);
    }

    #[test]
    fn test_self_query_scores_one() {
        let c = sample();
        let index = LexicalIndex::build(&c);
        let text = c.records()[3].search_text();
        let got = index.query(&c, &text, 1);
        assert_eq!(got[0].index, 3);
        assert!((got[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rare_term_outweighs_common_term() {
        let c = sample();
        let index = LexicalIndex::build(&c);
        let scores = index.scores("line2 porosity");
        // "line2" appears twice in the corpus, "porosity" once.
        assert!(scores[1] > scores[4]);
    }

    #[test]
    fn test_cache_reuses_and_invalidates() {
        let c = sample();
        let mut cache = LexicalCache::new();
        assert!(!cache.contains(c.version()));
        cache.get_or_build(c.version(), &c);
        assert!(cache.contains(c.version()));

        let other = RecordCollection::new(vec![rec("X", "Y", "Z", "W")]);
        let index = cache.get_or_build(other.version(), &other);
        assert_eq!(index.len(), 1);
        assert!(!cache.contains(c.version()));

        cache.invalidate();
        assert!(!cache.contains(other.version()));
    }

    #[test]
    fn test_cache_does_not_detect_staleness_under_same_key() {
        let c = sample();
        let mut cache = LexicalCache::new();
        cache.get_or_build("default", &c);
        let smaller = RecordCollection::new(vec![rec("X", "Y", "Z", "W")]);
        // Same key: the stale index is served until the caller invalidates.
        assert_eq!(cache.get_or_build("default", &smaller).len(), 5);
        cache.invalidate();
        assert_eq!(cache.get_or_build("default", &smaller).len(), 1);
    }
}
