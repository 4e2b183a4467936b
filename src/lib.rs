//! # NC Analyzer
//!
//! Retrieval and CAPA drafting for manufacturing non-conformance (NC)
//! incidents.
//!
//! A new incident (factory, machine, shift, issue, notes) is matched against
//! a CSV log of past incidents, either lexically (TF-IDF) or semantically
//! (remote OpenAI embeddings or a local model). The best matches feed a
//! root-cause narrative and a CAPA plan, written by a chat model when a
//! credential is available and from a fixed template otherwise.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌─────────────┐
//! │ CSV log     │──▶│ Ranker           │──▶│ Narrative   │
//! │ (store)     │   │ TF-IDF / vectors │   │ template/LLM│
//! └─────────────┘   └──────────────────┘   └──────┬──────┘
//!                                                 │
//!                      ┌──────────────────────────┤
//!                      ▼                          ▼
//!                 ┌──────────┐              ┌──────────┐
//!                 │   CLI    │              │   HTTP   │
//!                 │  (ncx)   │              │  + PDF   │
//!                 └──────────┘              └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ncx records
//! ncx search "Line1 PressA burr"
//! ncx analyze --factory Line1 --machine PressA --shift Day --issue "burr on edge" --pdf .
//! ncx serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`store`] | CSV loading |
//! | [`embedding`] | OpenAI and local embedding providers |
//! | [`generation`] | OpenAI chat backend |
//! | [`ranker`] | Lexical/semantic ranking behind one interface |
//! | [`analyze`] | Request boundary and report assembly |
//! | [`report`] | PDF rendering |
//! | [`search`] | `ncx search` |
//! | [`server`] | HTTP server |
//!
//! Pure logic (records, TF-IDF, similarity, ranking policy, templates) lives
//! in [`nc_analyzer_core`].

pub mod analyze;
pub mod config;
pub mod embedding;
pub mod generation;
pub mod logging;
pub mod ranker;
pub mod report;
pub mod search;
pub mod server;
pub mod store;
