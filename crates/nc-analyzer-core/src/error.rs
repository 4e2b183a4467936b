//! Error taxonomy shared by every retrieval and synthesis path.
//!
//! Each variant carries a distinct recovery policy:
//!
//! | Variant | Meaning | Caller policy |
//! |---------|---------|---------------|
//! | [`NcError::DataSource`] | incident log unreadable | fatal to the request |
//! | [`NcError::EmbeddingService`] | remote embedding call failed | pick another backend next request |
//! | [`NcError::UnavailableBackend`] | local model cannot be loaded | pick another backend next request |
//! | [`NcError::Generation`] | narrative backend failed | fall back to the templated narrative |

use thiserror::Error;

/// Errors produced by the NC Analyzer core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NcError {
    /// The record source could not be read at all (not found, unparseable).
    #[error("data source error: {0}")]
    DataSource(String),

    /// The remote embedding service was unreachable or rejected the request.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The local embedding model or its runtime is not available.
    #[error("unavailable backend: {0}")]
    UnavailableBackend(String),

    /// The generative narrative backend failed.
    #[error("generation error: {0}")]
    Generation(String),
}

impl NcError {
    /// Machine-readable code used in JSON reports and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            NcError::DataSource(_) => "data_source",
            NcError::EmbeddingService(_) => "embedding_service",
            NcError::UnavailableBackend(_) => "unavailable_backend",
            NcError::Generation(_) => "generation",
        }
    }

    /// Whether the condition can be recovered from by choosing a different
    /// backend (or the template) instead of failing the whole request.
    pub fn is_degradable(&self) -> bool {
        !matches!(self, NcError::DataSource(_))
    }
}

pub type NcResult<T> = Result<T, NcError>;
