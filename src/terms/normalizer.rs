//! Term normalization for deduplication and stable ordering.

use std::collections::HashMap;

use tracing::instrument;

use crate::query::SearchTerm;

/// Normalizes term text: lowercase, trimmed, inner whitespace collapsed.
#[must_use]
pub fn normalize_term_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Merges case-insensitive duplicates, keeping the highest weight.
///
/// Output is sorted by weight descending, then alphabetically, so the
/// result is independent of input order.
#[must_use]
#[instrument(skip(terms), fields(count = terms.len()))]
pub fn merge_terms(terms: Vec<SearchTerm>) -> Vec<SearchTerm> {
    let mut best: HashMap<String, f64> = HashMap::new();

    for term in terms {
        let text = normalize_term_text(&term.text);
        if text.is_empty() || !term.weight.is_finite() {
            continue;
        }
        best.entry(text)
            .and_modify(|w| *w = w.max(term.weight))
            .or_insert(term.weight);
    }

    let mut merged: Vec<SearchTerm> = best
        .into_iter()
        .map(|(text, weight)| SearchTerm::new(text, weight))
        .collect();
    merged.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.text.cmp(&b.text)));
    merged
}
