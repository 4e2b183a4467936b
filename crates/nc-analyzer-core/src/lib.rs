//! # NC Analyzer Core
//!
//! Shared, I/O-free logic for NC Analyzer: the incident record model,
//! the CSV boundary, lexical (TF-IDF) and semantic (embedding) retrieval,
//! ranking, and the root-cause / CAPA narrative synthesis.
//!
//! This crate contains no tokio runtime, HTTP client, or filesystem access.
//! Concrete embedding and generation backends (OpenAI, fastembed) live in
//! the `nc-analyzer` app crate and plug in through the
//! [`embedding::EmbeddingProvider`] and [`narrative::GenerativeBackend`]
//! traits.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────┐   ┌───────────────────┐   ┌──────────────┐
//! │   records   │──▶│ lexical / semantic │──▶│  narrative   │
//! │  (CSV load) │   │   rank (top-K)     │   │ (CAPA text)  │
//! └─────────────┘   └───────────────────┘   └──────────────┘
//! ```

pub mod embedding;
pub mod error;
pub mod lexical;
pub mod models;
pub mod narrative;
pub mod rank;
pub mod records;
pub mod semantic;
mod stop_words;

pub use error::{NcError, NcResult};
