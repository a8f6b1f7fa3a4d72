//! External bibliographic graph access.
//!
//! The engine consumes journals and works through the [`BibliographicSource`]
//! trait so the retrieval fan-out can be exercised against in-memory stubs.
//! [`OpenAlexSource`] is the production implementation.

mod error;
mod http_client;
mod openalex;

pub use error::{MAX_RETRY_AFTER, SourceError, parse_retry_after};
pub use http_client::{HttpTimeouts, build_source_http_client};
pub use openalex::{DEFAULT_OPENALEX_BASE_URL, OpenAlexSource};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::query::SearchTerm;

/// A subfield or field reference attached to a work or journal topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonRef {
    pub id: u32,
    pub name: String,
}

/// A work from the similar-works sample, tagged with its primary
/// subfield/field classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub id: String,
    pub title: String,
    pub cited_by_count: u64,
    pub subfield: Option<TaxonRef>,
    pub field: Option<TaxonRef>,
    /// Topic ids attached to the work, most relevant first.
    pub topic_ids: Vec<String>,
}

/// A topic a journal publishes in, with how many of its works carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalTopic {
    pub id: String,
    pub name: String,
    pub subfield_id: Option<u32>,
    pub field_id: Option<u32>,
    pub count: u64,
}

/// Journal-level bibliometric indicators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalMetrics {
    pub h_index: u32,
    pub works_count: u64,
    pub two_yr_mean_citedness: f64,
}

/// A journal as returned by a source, before merging and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceJournal {
    /// Stable source identifier (e.g. `S137773608`); may be empty when the
    /// source did not supply one.
    pub id: String,
    pub name: String,
    pub issn: Option<String>,
    pub publisher: Option<String>,
    pub metrics: JournalMetrics,
    pub is_open_access: bool,
    pub apc_usd: Option<u32>,
    pub topics: Vec<JournalTopic>,
}

/// Read-only access to an external bibliographic graph.
///
/// Implementations must be cheap to call concurrently; the engine issues the
/// three retrieval calls of a search at the same time.
#[async_trait]
pub trait BibliographicSource: Send + Sync {
    /// Short source name for logs.
    fn name(&self) -> &'static str;

    /// Works whose text matches `text`, each tagged with subfield/field ids.
    async fn similar_works_by_text(&self, text: &str, limit: usize)
    -> Result<Vec<Work>, SourceError>;

    /// Journals whose works cluster on any of `topic_ids`.
    async fn journals_by_topic(
        &self,
        topic_ids: &[String],
        limit: usize,
    ) -> Result<Vec<SourceJournal>, SourceError>;

    /// Journals publishing in the given subfield.
    async fn journals_by_subfield(
        &self,
        subfield_id: u32,
        limit: usize,
    ) -> Result<Vec<SourceJournal>, SourceError>;

    /// Journals matching a free-text search over `terms`.
    async fn journals_by_keyword(
        &self,
        terms: &[SearchTerm],
        limit: usize,
    ) -> Result<Vec<SourceJournal>, SourceError>;

    /// A single journal by id; `Ok(None)` when the source does not know it.
    async fn journal_by_id(&self, id: &str) -> Result<Option<SourceJournal>, SourceError>;
}
