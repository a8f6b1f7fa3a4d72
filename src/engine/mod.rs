//! Public search and explain operations.
//!
//! A search runs validation, term extraction, discipline detection, the
//! concurrent retrieval fan-out, merge and scoring in that order. Match
//! explanations are built on demand with [`MatchEngine::annotate`] or
//! [`MatchEngine::explain`]. The engine keeps no mutable state between
//! requests; the only cross-request state is the optional [`QueryCache`].

mod error;

pub use error::EngineError;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::cache::{QueryCache, TtlQueryCache};
use crate::config::EngineConfig;
use crate::discipline::{DisciplineDetection, DisciplineDetector, DisciplineProfile};
use crate::explain::{Explanation, ExplanationBuilder};
use crate::merge::{MergedJournal, merge};
use crate::query::{Query, SearchTerm};
use crate::retrieval::{Signal, SignalOutcome, fan_out};
use crate::scoring::{
    Categorizer, CandidateJournal, ScoringContext, ScoringEngine, title_matches,
};
use crate::source::{BibliographicSource, SourceJournal};
use crate::taxonomy::{Taxonomy, contains_words, word_sequence};
use crate::terms::TermExtractor;

/// Result of one search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResponse {
    /// Primary detection first, then secondaries. Empty when undetected.
    pub discipline_detections: Vec<DisciplineDetection>,
    /// Every distinct journal found, best first.
    pub candidates: Vec<CandidateJournal>,
    pub total_found: usize,
    pub signal_report: Vec<SignalOutcome>,
}

/// Journal matching engine over a [`BibliographicSource`].
pub struct MatchEngine {
    source: Arc<dyn BibliographicSource>,
    config: EngineConfig,
    taxonomy: Taxonomy,
    extractor: TermExtractor,
    cache: Option<Arc<dyn QueryCache>>,
}

impl std::fmt::Debug for MatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchEngine")
            .field("source", &self.source.name())
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl MatchEngine {
    /// Builds an engine, loading the taxonomy named by `config`.
    ///
    /// A [`TtlQueryCache`] is attached when `cache.enabled` is set.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the taxonomy cannot be loaded.
    pub fn new(source: Arc<dyn BibliographicSource>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let taxonomy = config.load_taxonomy()?;
        let cache = config.cache.enabled.then(|| {
            Arc::new(TtlQueryCache::from_settings(&config.cache)) as Arc<dyn QueryCache>
        });
        let engine = Self::with_taxonomy(source, config, taxonomy)?;
        Ok(match cache {
            Some(cache) => {
                debug!("Query cache enabled");
                engine.with_cache(cache)
            }
            None => engine,
        })
    }

    /// Builds an engine with an already loaded taxonomy.
    ///
    /// # Errors
    /// Returns an error if the term extractor cannot be built.
    pub fn with_taxonomy(
        source: Arc<dyn BibliographicSource>,
        config: EngineConfig,
        taxonomy: Taxonomy,
    ) -> Result<Self> {
        Ok(Self {
            source,
            config,
            taxonomy,
            extractor: TermExtractor::new()?,
            cache: None,
        })
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates raw input against the configured limits.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidQuery`] for short or oversized input.
    pub fn build_query(
        &self,
        title: &str,
        abstract_text: &str,
        keywords: &[String],
        prefer_open_access: bool,
    ) -> Result<Query, EngineError> {
        Ok(Query::new(
            title,
            abstract_text,
            keywords,
            prefer_open_access,
            &self.config.query,
        )?)
    }

    /// Validates the input, then searches.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidQuery`] before any external call is made.
    pub async fn search(
        &self,
        title: &str,
        abstract_text: &str,
        keywords: &[String],
        prefer_open_access: bool,
    ) -> Result<SearchResponse, EngineError> {
        let query = self.build_query(title, abstract_text, keywords, prefer_open_access)?;
        Ok(self.search_query(&query).await)
    }

    /// Searches for a validated query, stopping early if `cancel` resolves first.
    ///
    /// In-flight source calls are dropped on cancellation.
    ///
    /// # Errors
    /// Returns [`EngineError::Cancelled`] when `cancel` wins the race.
    pub async fn search_with_cancel<C>(
        &self,
        query: &Query,
        cancel: C,
    ) -> Result<SearchResponse, EngineError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = cancel => {
                info!("Search cancelled by caller");
                Err(EngineError::Cancelled)
            }
            response = self.search_query(query) => Ok(response),
        }
    }

    /// Searches for a validated query. Signal failures degrade, never fail.
    #[instrument(skip_all, fields(
        title_len = query.title().len(),
        abstract_len = query.abstract_text().len(),
        keywords = query.keywords().len(),
    ))]
    pub async fn search_query(&self, query: &Query) -> SearchResponse {
        let key = query.fingerprint();
        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            debug!("Query cache hit");
            return cached;
        }

        let started = Instant::now();
        let terms = self
            .extractor
            .extract(query.title(), query.abstract_text(), query.keywords());

        let retry = self.config.retrieval.retry_policy();
        let detector = DisciplineDetector::new(&self.taxonomy, &self.config.discipline);
        let profile = match tokio::time::timeout(
            self.config.retrieval.signal_timeout(),
            detector.detect(self.source.as_ref(), &terms, &retry),
        )
        .await
        {
            Ok(profile) => profile,
            Err(_) => {
                warn!(
                    timeout_secs = self.config.retrieval.signal_timeout_secs,
                    "Discipline detection timed out; discipline boost disabled"
                );
                DisciplineProfile::default()
            }
        };

        let fanned = fan_out(
            self.source.as_ref(),
            &profile,
            &terms,
            &self.config.retrieval,
        )
        .await;
        let merged = merge(fanned.results);

        let ctx = ScoringContext {
            profile: &profile,
            terms: &terms,
            prefer_open_access: query.prefer_open_access(),
        };
        let candidates = self.scoring_engine().rank(merged, &ctx);
        let total_found = candidates.len();

        info!(
            terms = terms.len(),
            confidence = profile.confidence(),
            total_found,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Search complete"
        );

        let response = SearchResponse {
            discipline_detections: profile.detections,
            candidates,
            total_found,
            signal_report: fanned.report,
        };
        if let Some(cache) = &self.cache {
            cache.insert(key, response.clone());
        }
        response
    }

    /// Fills `match_details` and `matched_topics` for candidates returned by
    /// a search for `query`. Callers usually pass only the slice they display.
    pub fn annotate(&self, query: &Query, candidates: &mut [CandidateJournal]) {
        let terms = self
            .extractor
            .extract(query.title(), query.abstract_text(), query.keywords());
        let builder = ExplanationBuilder::new();
        for candidate in candidates.iter_mut() {
            builder.annotate(candidate, &terms);
        }
    }

    /// Explains why a journal matches a manuscript abstract.
    ///
    /// The journal is rescored without a discipline profile.
    ///
    /// # Errors
    /// Returns [`EngineError::CandidateNotFound`] for unknown ids and
    /// [`EngineError::Source`] when the lookup fails.
    #[instrument(skip(self, abstract_text), fields(abstract_len = abstract_text.len()))]
    pub async fn explain(
        &self,
        candidate_id: &str,
        abstract_text: &str,
    ) -> Result<Explanation, EngineError> {
        let id = candidate_id.trim();
        if id.is_empty() {
            return Err(EngineError::candidate_not_found(candidate_id));
        }

        let journal = self
            .source
            .journal_by_id(id)
            .await?
            .ok_or_else(|| EngineError::candidate_not_found(id))?;

        let terms = self.extractor.extract("", abstract_text, &[]);
        let signals = explain_signals(&journal, &terms);
        let profile = DisciplineProfile::default();
        let ctx = ScoringContext {
            profile: &profile,
            terms: &terms,
            prefer_open_access: false,
        };

        let merged = MergedJournal {
            journal,
            signals_matched: signals,
        };
        let candidate = self
            .scoring_engine()
            .rank(vec![merged], &ctx)
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::candidate_not_found(id))?;

        let explanation = ExplanationBuilder::new().explain(&candidate, &terms);
        debug!(
            details = explanation.match_details.len(),
            topics = explanation.matched_topics.len(),
            "Explanation built"
        );
        Ok(explanation)
    }

    fn scoring_engine(&self) -> ScoringEngine<'_> {
        ScoringEngine::new(
            &self.taxonomy,
            &self.config.weights,
            self.config.normalizer(),
            Categorizer::new(self.config.categories.clone()),
        )
    }
}

/// The keyword signal counts as matched when the abstract's terms hit the
/// journal's name or one of its topics.
fn explain_signals(journal: &SourceJournal, terms: &[SearchTerm]) -> BTreeSet<Signal> {
    let topic_hit = journal.topics.iter().any(|topic| {
        let words = word_sequence(&topic.name);
        terms
            .iter()
            .any(|term| contains_words(&words, &word_sequence(&term.text)))
    });
    if topic_hit || title_matches(&journal.name, terms) {
        BTreeSet::from([Signal::Keyword])
    } else {
        BTreeSet::new()
    }
}
