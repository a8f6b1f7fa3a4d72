//! Journal Matcher Core Library
//!
//! Recommends academic journals for a manuscript. A search extracts weighted
//! terms from the title, abstract and keywords, detects the manuscript's
//! discipline from similar works, queries a bibliographic graph with three
//! concurrent retrieval signals, then merges, scores, normalizes and tiers
//! the candidate journals.
//!
//! # Architecture
//!
//! - [`query`] - Manuscript query validation and search terms
//! - [`terms`] - Weighted term extraction
//! - [`taxonomy`] - Subfield/field taxonomy
//! - [`source`] - Bibliographic source trait and the OpenAlex client
//! - [`retry`] - Retry classification and backoff for source calls
//! - [`discipline`] - Discipline detection from similar works
//! - [`retrieval`] - Concurrent topic/subfield/keyword fan-out
//! - [`merge`] - Cross-signal deduplication
//! - [`scoring`] - Composite scoring, normalization and categories
//! - [`explain`] - Deterministic match explanations
//! - [`cache`] - Injected query cache
//! - [`engine`] - `search` and `explain` entry points
//! - [`config`] - Engine settings and TOML loading

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod discipline;
pub mod engine;
pub mod explain;
pub mod merge;
pub mod query;
pub mod retrieval;
pub mod retry;
pub mod scoring;
pub mod source;
pub mod taxonomy;
pub mod terms;
#[cfg(test)]
pub mod test_support;
mod user_agent;

// Re-export commonly used types
pub use cache::{CacheSettings, QueryCache, TtlQueryCache};
pub use config::{EngineConfig, LoadedConfig, load_config, resolve_default_config_path};
pub use discipline::{Discipline, DisciplineDetection, DisciplineProfile};
pub use engine::{EngineError, MatchEngine, SearchResponse};
pub use explain::{Explanation, ExplanationBuilder};
pub use query::{Query, QueryError, QueryLimits, SearchTerm};
pub use retrieval::{Signal, SignalOutcome, SignalStatus};
pub use scoring::{CandidateJournal, Category, NormalizedScore, ScoreComponents};
pub use source::{BibliographicSource, OpenAlexSource, SourceError, SourceJournal};
pub use terms::TermExtractor;
