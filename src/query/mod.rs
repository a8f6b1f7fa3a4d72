//! Manuscript query model and validation.
//!
//! A [`Query`] is built once per request and never mutated afterwards.
//! [`Query::new`] performs the only fatal validation in the pipeline, so a
//! rejected query never reaches the bibliographic source.

mod error;

pub use error::QueryError;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default minimum title length in characters.
pub const DEFAULT_MIN_TITLE_CHARS: usize = 5;

/// Default minimum abstract length in characters.
pub const DEFAULT_MIN_ABSTRACT_CHARS: usize = 50;

/// Default maximum number of keywords.
pub const DEFAULT_MAX_KEYWORDS: usize = 20;

/// Length limits applied to incoming queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryLimits {
    /// Minimum trimmed title length.
    pub min_title_chars: usize,
    /// Minimum trimmed abstract length.
    pub min_abstract_chars: usize,
    /// Maximum number of non-empty keywords.
    pub max_keywords: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            min_title_chars: DEFAULT_MIN_TITLE_CHARS,
            min_abstract_chars: DEFAULT_MIN_ABSTRACT_CHARS,
            max_keywords: DEFAULT_MAX_KEYWORDS,
        }
    }
}

/// A validated manuscript query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    title: String,
    abstract_text: String,
    keywords: Vec<String>,
    prefer_open_access: bool,
}

impl Query {
    /// Builds a query, trimming fields and dropping blank keywords.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the title or abstract is below the
    /// configured minimum, or too many keywords are supplied.
    pub fn new(
        title: &str,
        abstract_text: &str,
        keywords: &[String],
        prefer_open_access: bool,
        limits: &QueryLimits,
    ) -> Result<Self, QueryError> {
        let title = title.trim();
        let abstract_text = abstract_text.trim();

        let title_len = title.chars().count();
        if title_len < limits.min_title_chars {
            return Err(QueryError::TitleTooShort {
                length: title_len,
                min: limits.min_title_chars,
            });
        }

        let abstract_len = abstract_text.chars().count();
        if abstract_len < limits.min_abstract_chars {
            return Err(QueryError::AbstractTooShort {
                length: abstract_len,
                min: limits.min_abstract_chars,
            });
        }

        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();
        if keywords.len() > limits.max_keywords {
            return Err(QueryError::TooManyKeywords {
                count: keywords.len(),
                max: limits.max_keywords,
            });
        }

        Ok(Self {
            title: title.to_string(),
            abstract_text: abstract_text.to_string(),
            keywords,
            prefer_open_access,
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn abstract_text(&self) -> &str {
        &self.abstract_text
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    #[must_use]
    pub fn prefer_open_access(&self) -> bool {
        self.prefer_open_access
    }

    /// Stable hex fingerprint of the case-folded query, used as a cache key.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.title.to_lowercase().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.abstract_text.to_lowercase().as_bytes());
        hasher.update([0u8]);
        let mut keywords: Vec<String> = self.keywords.iter().map(|k| k.to_lowercase()).collect();
        keywords.sort();
        for keyword in &keywords {
            hasher.update(keyword.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([u8::from(self.prefer_open_access)]);
        format!("{:x}", hasher.finalize())
    }
}

/// A weighted token or phrase extracted from a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTerm {
    /// Lowercased term text; phrases are space-separated.
    pub text: String,
    /// Relative weight; phrases and user keywords weigh more than single tokens.
    pub weight: f64,
}

impl SearchTerm {
    #[must_use]
    pub fn new(text: impl Into<String>, weight: f64) -> Self {
        Self {
            text: text.into(),
            weight,
        }
    }
}
