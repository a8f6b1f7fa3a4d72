//! Errors surfaced by the public engine API.

use thiserror::Error;

use crate::query::QueryError;
use crate::source::SourceError;

/// Fatal outcomes of [`MatchEngine`](super::MatchEngine) operations.
///
/// Per-signal failures and an empty discipline detection are not errors;
/// they are reported in [`SearchResponse`](super::SearchResponse).
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Rejected before any external call.
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    #[error("search cancelled by caller")]
    Cancelled,

    /// A direct lookup (not a retrieval signal) failed.
    #[error("bibliographic source lookup failed: {0}")]
    Source(#[from] SourceError),

    #[error(
        "journal '{id}' not found\n  Suggestion: Use an id returned by a previous search"
    )]
    CandidateNotFound { id: String },
}

impl EngineError {
    #[must_use]
    pub fn candidate_not_found(id: impl Into<String>) -> Self {
        Self::CandidateNotFound { id: id.into() }
    }
}
