//! Search term extraction with frequency-based phrase detection.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use regex::Regex;
use stop_words::{LANGUAGE, get};
use tracing::instrument;

use super::normalizer::merge_terms;
use crate::query::SearchTerm;

/// Maximum number of terms returned per query.
pub const MAX_TERMS: usize = 25;

/// Minimum occurrences for an n-gram to count as a phrase.
const MIN_PHRASE_FREQUENCY: usize = 2;

const TOKEN_WEIGHT: f64 = 1.0;
const BIGRAM_WEIGHT: f64 = 2.0;
const TRIGRAM_WEIGHT: f64 = 2.5;
const KEYWORD_WEIGHT: f64 = 3.0;
const TITLE_TOKEN_MULTIPLIER: f64 = 1.5;
/// Single-token weights approach but never reach this value, which is the
/// lowest weight a recurring phrase can have.
const TOKEN_WEIGHT_CEILING: f64 = BIGRAM_WEIGHT;

/// Generic academic connector words that carry no topical signal.
const ACADEMIC_STOPWORDS: &[&str] = &[
    "abstract", "also", "analysis", "apply", "applies", "applied", "approach", "approaches", "based", "study", "studies",
    "paper", "present", "presents", "proposed", "propose", "result", "results", "method",
    "methods", "novel", "new", "using", "used", "use", "show", "shows", "shown", "however",
    "within", "across", "among", "via", "toward", "towards", "finding", "findings", "research",
    "investigate", "investigates", "investigated", "demonstrate", "demonstrates", "significant",
    "significantly", "various", "several", "well", "application", "applications",
];

/// Turns manuscript text into weighted search terms.
///
/// Single tokens survive stopword removal; adjacent content tokens that recur
/// at least twice across title, abstract and keywords become phrases and are
/// weighted above single tokens. The extractor caches its stopword set and
/// tokenizer, so one instance can be shared across requests.
pub struct TermExtractor {
    stopwords: HashSet<String>,
    token_pattern: Regex,
}

impl std::fmt::Debug for TermExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermExtractor")
            .field("stopwords", &self.stopwords.len())
            .finish_non_exhaustive()
    }
}

impl TermExtractor {
    /// Creates an extractor with English and academic stopwords.
    ///
    /// # Errors
    /// Returns error if the tokenizer pattern cannot be compiled.
    #[instrument]
    pub fn new() -> Result<Self> {
        let mut stopwords: HashSet<String> = get(LANGUAGE::English)
            .iter()
            .map(|w| w.to_lowercase())
            .collect();
        stopwords.extend(ACADEMIC_STOPWORDS.iter().map(|w| (*w).to_string()));

        let token_pattern = Regex::new(r"[\p{L}\p{N}]+(?:['-][\p{L}\p{N}]+)*")
            .context("Failed to compile term tokenizer pattern")?;

        Ok(Self {
            stopwords,
            token_pattern,
        })
    }

    /// Extracts weighted search terms from title, abstract and keywords.
    ///
    /// Output is deterministic: sorted by weight descending, then text.
    #[must_use]
    #[instrument(skip_all, fields(title_len = title.len(), abstract_len = abstract_text.len(), keywords = keywords.len()))]
    pub fn extract(&self, title: &str, abstract_text: &str, keywords: &[String]) -> Vec<SearchTerm> {
        let title_runs = self.content_runs(title);
        let mut abstract_runs = self.content_runs(abstract_text);

        if abstract_runs.iter().all(Vec::is_empty) {
            // Nothing topical left in the abstract; fall back to raw title tokens.
            abstract_runs = vec![self.raw_tokens(title)];
        }

        let keyword_runs: Vec<Vec<String>> = keywords.iter().map(|k| self.raw_tokens(k)).collect();

        let mut terms = Vec::new();

        // Single tokens, counted across title and abstract.
        let mut token_counts: HashMap<&str, usize> = HashMap::new();
        let mut title_tokens: HashSet<&str> = HashSet::new();
        for token in title_runs.iter().flatten() {
            *token_counts.entry(token).or_default() += 1;
            title_tokens.insert(token);
        }
        for token in abstract_runs.iter().flatten() {
            *token_counts.entry(token).or_default() += 1;
        }
        for (token, count) in &token_counts {
            let mut weight = TOKEN_WEIGHT * frequency_factor(*count);
            if title_tokens.contains(token) {
                weight *= TITLE_TOKEN_MULTIPLIER;
            }
            terms.push(SearchTerm::new(*token, token_band(weight)));
        }

        // Phrases, counted across every run including keywords.
        let all_runs: Vec<&Vec<String>> = title_runs
            .iter()
            .chain(abstract_runs.iter())
            .chain(keyword_runs.iter())
            .collect();
        terms.extend(detect_phrases(&all_runs));

        // User keywords are explicit signal regardless of frequency.
        for run in &keyword_runs {
            if !run.is_empty() {
                terms.push(SearchTerm::new(run.join(" "), KEYWORD_WEIGHT));
            }
        }

        let mut merged = merge_terms(terms);
        merged.truncate(MAX_TERMS);
        merged
    }

    /// Splits text into runs of consecutive content tokens, broken at stopwords.
    fn content_runs(&self, text: &str) -> Vec<Vec<String>> {
        let mut runs = Vec::new();
        let mut current = Vec::new();
        for token in self.token_pattern.find_iter(text) {
            let token = token.as_str().to_lowercase();
            if self.is_content_token(&token) {
                current.push(token);
            } else if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }

    /// Lowercased tokens without stopword filtering.
    fn raw_tokens(&self, text: &str) -> Vec<String> {
        self.token_pattern
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }

    fn is_content_token(&self, token: &str) -> bool {
        token.chars().count() >= 3
            && !token.chars().all(|c| c.is_ascii_digit())
            && !self.stopwords.contains(token)
    }
}

/// Counts bigrams and trigrams inside runs and keeps the recurring ones.
///
/// A bigram that only ever occurs inside a kept trigram is dropped.
fn detect_phrases(runs: &[&Vec<String>]) -> Vec<SearchTerm> {
    let mut bigrams: HashMap<String, usize> = HashMap::new();
    let mut trigrams: HashMap<String, usize> = HashMap::new();

    for run in runs {
        for window in run.windows(2) {
            *bigrams.entry(window.join(" ")).or_default() += 1;
        }
        for window in run.windows(3) {
            *trigrams.entry(window.join(" ")).or_default() += 1;
        }
    }

    let kept_trigrams: Vec<(&String, usize)> = trigrams
        .iter()
        .filter(|(_, count)| **count >= MIN_PHRASE_FREQUENCY)
        .map(|(text, count)| (text, *count))
        .collect();

    let mut phrases: Vec<SearchTerm> = kept_trigrams
        .iter()
        .map(|(text, count)| SearchTerm::new(text.as_str(), TRIGRAM_WEIGHT * frequency_factor(*count)))
        .collect();

    for (text, count) in &bigrams {
        if *count < MIN_PHRASE_FREQUENCY {
            continue;
        }
        let subsumed = kept_trigrams
            .iter()
            .any(|(tri, tri_count)| *tri_count == *count && contains_phrase(tri, text));
        if !subsumed {
            phrases.push(SearchTerm::new(text.as_str(), BIGRAM_WEIGHT * frequency_factor(*count)));
        }
    }

    phrases
}

fn contains_phrase(haystack: &str, needle: &str) -> bool {
    haystack.starts_with(&format!("{needle} ")) || haystack.ends_with(&format!(" {needle}"))
}

/// Maps a raw token weight into `[0, TOKEN_WEIGHT_CEILING)`, keeping order.
fn token_band(weight: f64) -> f64 {
    TOKEN_WEIGHT_CEILING * weight / (weight + 1.0)
}

#[allow(clippy::cast_precision_loss)]
fn frequency_factor(count: usize) -> f64 {
    1.0 + (count as f64).ln()
}
