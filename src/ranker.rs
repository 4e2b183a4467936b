//! Ranker: one query interface over the lexical and semantic indexers.
//!
//! The mode is decided before [`Ranker::rank`] is called (see
//! [`nc_analyzer_core::rank::select_mode`]). A failing semantic backend is
//! returned to the caller as-is; the ranker never retries and never switches
//! to another backend on its own. The caller can [`Ranker::retire`] a failed
//! backend so later requests resolve to the next one down.

use nc_analyzer_core::embedding::EmbeddingProvider;
use nc_analyzer_core::lexical::LexicalCache;
use nc_analyzer_core::models::{RecordCollection, ScoredMatch};
use nc_analyzer_core::rank::RankMode;
use nc_analyzer_core::semantic::{build_and_query, SemanticBackend};
use nc_analyzer_core::{NcError, NcResult};

use crate::config::{Credential, EmbeddingConfig};
use crate::embedding::{create_local_provider, create_remote_provider};

pub struct Ranker {
    lexical: LexicalCache,
    remote: Option<Box<dyn EmbeddingProvider>>,
    local: Option<Box<dyn EmbeddingProvider>>,
}

impl Ranker {
    pub fn new(
        remote: Option<Box<dyn EmbeddingProvider>>,
        local: Option<Box<dyn EmbeddingProvider>>,
    ) -> Self {
        Self {
            lexical: LexicalCache::new(),
            remote,
            local,
        }
    }

    /// Lexical only.
    pub fn lexical_only() -> Self {
        Self::new(None, None)
    }

    /// Build the providers this process can offer: the remote one when a
    /// credential exists, the local one when it is compiled in.
    pub fn from_config(config: &EmbeddingConfig, credential: Option<&Credential>) -> NcResult<Self> {
        let remote = match credential {
            Some(_) => Some(create_remote_provider(config, credential)?),
            None => None,
        };
        let local = match create_local_provider(config) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::debug!(error = %e, "local embeddings not available");
                None
            }
        };
        Ok(Self::new(remote, local))
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn has_local(&self) -> bool {
        self.local.is_some()
    }

    /// Rank `records` against `query` with the given backend.
    ///
    /// The lexical index is cached under the collection's content version,
    /// so an unchanged corpus is only vectorized once.
    pub async fn rank(
        &mut self,
        records: &RecordCollection,
        query: &str,
        top_k: usize,
        mode: RankMode,
    ) -> NcResult<Vec<ScoredMatch>> {
        let matches = match mode {
            RankMode::Lexical => self
                .lexical
                .get_or_build(records.version(), records)
                .query(records, query, top_k),
            RankMode::SemanticRemote => {
                let provider = self.remote.as_deref().ok_or_else(|| {
                    NcError::EmbeddingService("no remote embedding provider configured".into())
                })?;
                build_and_query(records, query, top_k, SemanticBackend::Remote(provider)).await?
            }
            RankMode::SemanticLocal => {
                let provider = self.local.as_deref().ok_or_else(|| {
                    NcError::UnavailableBackend("no local embedding model in this build".into())
                })?;
                build_and_query(records, query, top_k, SemanticBackend::Local(provider)).await?
            }
        };

        tracing::debug!(
            %mode,
            results = matches.len(),
            top_score = matches.first().map(|m| m.score).unwrap_or(0.0),
            "ranked"
        );
        Ok(matches)
    }

    /// Stop offering the semantic backend behind `mode`. Returns whether a
    /// provider was dropped; the lexical path cannot be retired.
    pub fn retire(&mut self, mode: RankMode) -> bool {
        let slot = match mode {
            RankMode::Lexical => return false,
            RankMode::SemanticRemote => &mut self.remote,
            RankMode::SemanticLocal => &mut self.local,
        };
        slot.take().is_some()
    }

    /// Drop the cached lexical index. Call after the record source changes.
    pub fn invalidate(&mut self) {
        self.lexical.invalidate();
    }

    /// Whether a lexical index for `version` is cached.
    pub fn is_cached(&self, version: &str) -> bool {
        self.lexical.contains(version)
    }
}
