//! Search term extraction from manuscript metadata.
//!
//! Terms feed every downstream stage: the similar-works sample used for
//! discipline detection, the keyword retrieval signal, and the title match
//! bonus in scoring.

mod extractor;
mod normalizer;

pub use extractor::{MAX_TERMS, TermExtractor};
pub use normalizer::{merge_terms, normalize_term_text};

use crate::query::SearchTerm;

/// Builds a free-text search string from the highest weighted terms.
#[must_use]
pub fn search_text(terms: &[SearchTerm], max_terms: usize) -> String {
    terms
        .iter()
        .take(max_terms)
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports_are_accessible() {
        let extractor = TermExtractor::new();
        assert!(extractor.is_ok());
    }

    #[test]
    fn test_search_text_takes_leading_terms() {
        let terms = vec![
            SearchTerm::new("machine learning", 3.0),
            SearchTerm::new("cancer", 2.0),
            SearchTerm::new("scans", 1.0),
        ];
        assert_eq!(search_text(&terms, 2), "machine learning cancer");
        assert_eq!(search_text(&[], 5), "");
    }
}
