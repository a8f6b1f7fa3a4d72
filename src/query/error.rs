//! Error types for manuscript query validation.

use thiserror::Error;

/// Rejections raised before any external call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Title is shorter than the minimum viable length
    #[error(
        "title too short ({length} chars, min {min})\n  Suggestion: Provide the full manuscript title"
    )]
    TitleTooShort {
        /// Trimmed title length in characters
        length: usize,
        /// Minimum required length
        min: usize,
    },

    /// Abstract is shorter than the minimum viable length
    #[error(
        "abstract too short ({length} chars, min {min})\n  Suggestion: Paste the complete abstract so the manuscript's discipline can be detected"
    )]
    AbstractTooShort {
        /// Trimmed abstract length in characters
        length: usize,
        /// Minimum required length
        min: usize,
    },

    /// More keywords than the engine accepts
    #[error("too many keywords ({count}, max {max})\n  Suggestion: Keep only the most specific keywords")]
    TooManyKeywords {
        /// Number of non-empty keywords supplied
        count: usize,
        /// Maximum allowed
        max: usize,
    },
}
