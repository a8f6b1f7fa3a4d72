//! Composite relevance scoring, normalization and tiering.
//!
//! The raw score is an additive sum of itemized components multiplied by a
//! merge factor that grows with the number of agreeing signals. The
//! discipline boost is soft: it is only ever added, so a journal without
//! discipline overlap keeps every other component and stays in the results.

mod category;
mod normalize;

pub use category::{Categorizer, Category, CategoryThresholds};
pub use normalize::{DEFAULT_NORMALIZATION_CEILING, NormalizedScore, Normalizer, clamp_unit};

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::discipline::{DisciplineDetection, DisciplineProfile};
use crate::merge::MergedJournal;
use crate::query::SearchTerm;
use crate::retrieval::Signal;
use crate::source::{JournalMetrics, JournalTopic, SourceJournal};
use crate::taxonomy::{Taxonomy, contains_words, word_sequence};

/// Tunable weights. Defaults are starting points, not validated optima.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringWeights {
    pub topic_bonus: f64,
    pub subfield_bonus: f64,
    pub keyword_bonus: f64,
    pub title_bonus: f64,
    pub h_index_coefficient: f64,
    pub h_index_cap: u32,
    pub citedness_coefficient: f64,
    pub citedness_cap: f64,
    pub discipline_boost: f64,
    /// Multiplier applied to the boost from secondary detections.
    pub secondary_boost_factor: f64,
    /// Merge factor is `1 + merge_factor_per_signal * (signals - 1)`.
    pub merge_factor_per_signal: f64,
    pub open_access_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            topic_bonus: 20.0,
            subfield_bonus: 15.0,
            keyword_bonus: 15.0,
            title_bonus: 30.0,
            h_index_coefficient: 0.05,
            h_index_cap: 500,
            citedness_coefficient: 2.0,
            citedness_cap: 20.0,
            discipline_boost: 25.0,
            secondary_boost_factor: 0.5,
            merge_factor_per_signal: 0.25,
            open_access_bonus: 5.0,
        }
    }
}

/// Itemized contributions to a raw score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub topic_match: f64,
    pub subfield_match: f64,
    pub keyword_match: f64,
    pub title_match: f64,
    pub h_index_contribution: f64,
    pub citation_contribution: f64,
    pub discipline_boost: f64,
    pub open_access_bonus: f64,
    /// Extra score from the merge factor; already included in [`total`](Self::total).
    pub merge_bonus: f64,
}

impl ScoreComponents {
    /// Sum of the additive components, before the merge factor.
    #[must_use]
    pub fn additive_total(&self) -> f64 {
        self.topic_match
            + self.subfield_match
            + self.keyword_match
            + self.title_match
            + self.h_index_contribution
            + self.citation_contribution
            + self.discipline_boost
            + self.open_access_bonus
    }

    /// The raw score.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.additive_total() + self.merge_bonus
    }
}

/// A scored, normalized and categorized journal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateJournal {
    pub id: String,
    pub name: String,
    pub issn: Option<String>,
    pub publisher: Option<String>,
    pub metrics: JournalMetrics,
    pub is_open_access: bool,
    pub apc_usd: Option<u32>,
    pub topics: Vec<JournalTopic>,
    pub signals_matched: BTreeSet<Signal>,
    pub raw_score: f64,
    pub normalized_score: NormalizedScore,
    pub category: Category,
    pub score_components: ScoreComponents,
    /// Filled on demand by the explanation builder.
    pub matched_topics: Vec<String>,
    /// Filled on demand by the explanation builder.
    pub match_details: Vec<String>,
}

/// Per-request inputs shared by every candidate's score.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub profile: &'a DisciplineProfile,
    pub terms: &'a [SearchTerm],
    pub prefer_open_access: bool,
}

/// Scores, normalizes, categorizes and orders candidates.
#[derive(Debug, Clone)]
pub struct ScoringEngine<'a> {
    taxonomy: &'a Taxonomy,
    weights: &'a ScoringWeights,
    normalizer: Normalizer,
    categorizer: Categorizer,
}

impl<'a> ScoringEngine<'a> {
    #[must_use]
    pub fn new(
        taxonomy: &'a Taxonomy,
        weights: &'a ScoringWeights,
        normalizer: Normalizer,
        categorizer: Categorizer,
    ) -> Self {
        Self {
            taxonomy,
            weights,
            normalizer,
            categorizer,
        }
    }

    /// Computes the itemized score of one journal.
    #[must_use]
    pub fn score(
        &self,
        journal: &SourceJournal,
        signals: &BTreeSet<Signal>,
        ctx: &ScoringContext<'_>,
    ) -> ScoreComponents {
        let w = self.weights;
        let flat = |signal: Signal, bonus: f64| {
            if signals.contains(&signal) { bonus } else { 0.0 }
        };

        let mut components = ScoreComponents {
            topic_match: flat(Signal::Topic, w.topic_bonus),
            subfield_match: flat(Signal::Subfield, w.subfield_bonus),
            keyword_match: flat(Signal::Keyword, w.keyword_bonus),
            title_match: if title_matches(&journal.name, ctx.terms) {
                w.title_bonus
            } else {
                0.0
            },
            h_index_contribution: f64::from(journal.metrics.h_index.min(w.h_index_cap))
                * w.h_index_coefficient,
            citation_contribution: journal
                .metrics
                .two_yr_mean_citedness
                .clamp(0.0, w.citedness_cap)
                * w.citedness_coefficient,
            discipline_boost: self.discipline_boost(journal, signals, ctx.profile),
            open_access_bonus: if ctx.prefer_open_access && journal.is_open_access {
                w.open_access_bonus
            } else {
                0.0
            },
            merge_bonus: 0.0,
        };

        let additive = components.additive_total().max(0.0);
        components.merge_bonus = additive * (self.merge_factor(signals) - 1.0);
        components
    }

    /// `1 + per_signal * (n - 1)` for `n` agreeing signals.
    #[must_use]
    pub fn merge_factor(&self, signals: &BTreeSet<Signal>) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let extra = signals.len().saturating_sub(1) as f64;
        1.0 + self.weights.merge_factor_per_signal.max(0.0) * extra
    }

    /// Best boost among detections the journal overlaps; 0 without overlap.
    fn discipline_boost(
        &self,
        journal: &SourceJournal,
        signals: &BTreeSet<Signal>,
        profile: &DisciplineProfile,
    ) -> f64 {
        profile
            .detections
            .iter()
            .filter(|detection| self.overlaps(journal, signals, detection))
            .map(|detection| {
                let discipline = detection.discipline();
                let rank_factor = if detection.is_primary() {
                    1.0
                } else {
                    self.weights.secondary_boost_factor
                };
                self.weights.discipline_boost * discipline.confidence.clamp(0.0, 1.0) * rank_factor
            })
            .fold(0.0, f64::max)
    }

    fn overlaps(
        &self,
        journal: &SourceJournal,
        signals: &BTreeSet<Signal>,
        detection: &DisciplineDetection,
    ) -> bool {
        let subfield_id = detection.discipline().subfield_id;
        // The subfield signal searched by the primary detection's id.
        (detection.is_primary() && signals.contains(&Signal::Subfield))
            || journal
                .topics
                .iter()
                .any(|t| t.subfield_id == Some(subfield_id))
            || self.taxonomy.mentions_subfield(subfield_id, &journal.name)
    }

    /// Scores every merged journal and returns them best first.
    #[instrument(skip_all, fields(candidates = merged.len()))]
    #[must_use]
    pub fn rank(&self, merged: Vec<MergedJournal>, ctx: &ScoringContext<'_>) -> Vec<CandidateJournal> {
        let mut candidates: Vec<CandidateJournal> = merged
            .into_iter()
            .map(|m| self.build_candidate(m, ctx))
            .collect();
        candidates.sort_by(compare_candidates);
        debug!(
            best = candidates.first().map(|c| c.normalized_score.get()),
            "Candidates ranked"
        );
        candidates
    }

    fn build_candidate(&self, merged: MergedJournal, ctx: &ScoringContext<'_>) -> CandidateJournal {
        let MergedJournal {
            journal,
            signals_matched,
        } = merged;
        let components = self.score(&journal, &signals_matched, ctx);
        let raw_score = components.total().max(0.0);
        let normalized_score = self.normalizer.normalize(raw_score);
        let category = self.categorizer.categorize(
            normalized_score,
            &journal.metrics,
            &signals_matched,
            components.discipline_boost,
        );

        CandidateJournal {
            id: journal.id,
            name: journal.name,
            issn: journal.issn,
            publisher: journal.publisher,
            metrics: journal.metrics,
            is_open_access: journal.is_open_access,
            apc_usd: journal.apc_usd,
            topics: journal.topics,
            signals_matched,
            raw_score,
            normalized_score,
            category,
            score_components: components,
            matched_topics: Vec::new(),
            match_details: Vec::new(),
        }
    }
}

/// Normalized score desc, then raw score desc, then name and id.
#[must_use]
pub fn compare_candidates(a: &CandidateJournal, b: &CandidateJournal) -> Ordering {
    b.normalized_score
        .get()
        .total_cmp(&a.normalized_score.get())
        .then(b.raw_score.total_cmp(&a.raw_score))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// True when any search term appears as a whole-word run in `name`.
#[must_use]
pub fn title_matches(name: &str, terms: &[SearchTerm]) -> bool {
    let haystack = word_sequence(name);
    terms
        .iter()
        .any(|term| contains_words(&haystack, &word_sequence(&term.text)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::discipline::Discipline;

    fn journal(name: &str, h_index: u32, citedness: f64, subfield: Option<u32>) -> SourceJournal {
        SourceJournal {
            id: format!("S-{name}"),
            name: name.to_string(),
            issn: None,
            publisher: None,
            metrics: JournalMetrics {
                h_index,
                works_count: 3_000,
                two_yr_mean_citedness: citedness,
            },
            is_open_access: false,
            apc_usd: None,
            topics: subfield
                .map(|id| JournalTopic {
                    id: "T1".to_string(),
                    name: "Topic".to_string(),
                    subfield_id: Some(id),
                    field_id: Some(id / 100),
                    count: 10,
                })
                .into_iter()
                .collect(),
        }
    }

    fn profile(subfield_id: u32, confidence: f64) -> DisciplineProfile {
        DisciplineProfile {
            detections: vec![DisciplineDetection::Primary(Discipline {
                subfield_id,
                subfield_name: "x".to_string(),
                field_id: None,
                field_name: None,
                confidence,
            })],
            topic_ids: Vec::new(),
            sample_size: 10,
        }
    }

    fn signals(list: &[Signal]) -> BTreeSet<Signal> {
        list.iter().copied().collect()
    }

    struct Fixture {
        taxonomy: Taxonomy,
        weights: ScoringWeights,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                taxonomy: Taxonomy::embedded().unwrap(),
                weights: ScoringWeights::default(),
            }
        }

        fn engine(&self) -> ScoringEngine<'_> {
            ScoringEngine::new(
                &self.taxonomy,
                &self.weights,
                Normalizer::default(),
                Categorizer::default(),
            )
        }
    }

    #[test]
    fn test_components_for_single_signal() {
        let fixture = Fixture::new();
        let empty = DisciplineProfile::default();
        let ctx = ScoringContext {
            profile: &empty,
            terms: &[],
            prefer_open_access: false,
        };
        let c = fixture
            .engine()
            .score(&journal("Gadgets", 200, 4.0, None), &signals(&[Signal::Topic]), &ctx);
        assert!((c.topic_match - 20.0).abs() < 1e-9);
        assert!((c.h_index_contribution - 10.0).abs() < 1e-9);
        assert!((c.citation_contribution - 8.0).abs() < 1e-9);
        assert!(c.merge_bonus.abs() < 1e-9);
        assert!((c.total() - 38.0).abs() < 1e-9);
    }

    #[test]
    fn test_metric_contributions_are_capped() {
        let fixture = Fixture::new();
        let empty = DisciplineProfile::default();
        let ctx = ScoringContext {
            profile: &empty,
            terms: &[],
            prefer_open_access: false,
        };
        let c = fixture.engine().score(
            &journal("Huge", 5_000, 500.0, None),
            &signals(&[Signal::Keyword]),
            &ctx,
        );
        assert!((c.h_index_contribution - 25.0).abs() < 1e-9);
        assert!((c.citation_contribution - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_bonus_is_multiplicative() {
        let fixture = Fixture::new();
        let empty = DisciplineProfile::default();
        let ctx = ScoringContext {
            profile: &empty,
            terms: &[],
            prefer_open_access: false,
        };
        let engine = fixture.engine();
        let j = journal("Gadgets", 100, 2.0, None);
        let both = engine.score(&j, &signals(&[Signal::Topic, Signal::Keyword]), &ctx);
        let additive = both.additive_total();
        assert!((both.merge_bonus - additive * 0.25).abs() < 1e-9);
        assert!(both.total() > 20.0 + 15.0);
        let topic_only = engine.score(&j, &signals(&[Signal::Topic]), &ctx).total();
        let keyword_only = engine.score(&j, &signals(&[Signal::Keyword]), &ctx).total();
        assert!(both.total() > topic_only.max(keyword_only));
    }

    #[test]
    fn test_discipline_boost_scaled_by_confidence_and_requires_overlap() {
        let fixture = Fixture::new();
        let p = profile(2730, 0.8);
        let ctx = ScoringContext {
            profile: &p,
            terms: &[],
            prefer_open_access: false,
        };
        let engine = fixture.engine();
        let overlapping = engine.score(
            &journal("Gadgets", 0, 0.0, Some(2730)),
            &signals(&[Signal::Topic]),
            &ctx,
        );
        assert!((overlapping.discipline_boost - 20.0).abs() < 1e-9);

        let by_name = engine.score(
            &journal("Journal of Clinical Oncology", 0, 0.0, None),
            &signals(&[Signal::Topic]),
            &ctx,
        );
        assert!(by_name.discipline_boost > 0.0);

        let unrelated = engine.score(
            &journal("Gadgets", 0, 0.0, Some(1702)),
            &signals(&[Signal::Topic]),
            &ctx,
        );
        assert!(unrelated.discipline_boost.abs() < 1e-9);
        assert!(unrelated.total() > 0.0);
    }

    #[test]
    fn test_secondary_detection_boost_is_scaled() {
        let fixture = Fixture::new();
        let p = DisciplineProfile {
            detections: vec![
                DisciplineDetection::Primary(Discipline {
                    subfield_id: 2741,
                    subfield_name: "Radiology".to_string(),
                    field_id: None,
                    field_name: None,
                    confidence: 0.6,
                }),
                DisciplineDetection::Secondary(Discipline {
                    subfield_id: 1702,
                    subfield_name: "AI".to_string(),
                    field_id: None,
                    field_name: None,
                    confidence: 0.4,
                }),
            ],
            topic_ids: Vec::new(),
            sample_size: 10,
        };
        let ctx = ScoringContext {
            profile: &p,
            terms: &[],
            prefer_open_access: false,
        };
        let c = fixture.engine().score(
            &journal("Gadgets", 0, 0.0, Some(1702)),
            &signals(&[Signal::Keyword]),
            &ctx,
        );
        assert!((c.discipline_boost - 25.0 * 0.4 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_title_match_is_whole_word_and_case_insensitive() {
        let terms = vec![SearchTerm::new("medical image", 2.0)];
        assert!(title_matches("Medical Image Analysis", &terms));
        assert!(!title_matches("Biomedical Imaging", &terms));
        assert!(!title_matches("Anything", &[]));
    }

    #[test]
    fn test_open_access_bonus_only_when_preferred() {
        let fixture = Fixture::new();
        let empty = DisciplineProfile::default();
        let mut oa = journal("Open", 0, 0.0, None);
        oa.is_open_access = true;
        let engine = fixture.engine();
        let prefer = ScoringContext {
            profile: &empty,
            terms: &[],
            prefer_open_access: true,
        };
        let neutral = ScoringContext {
            prefer_open_access: false,
            ..prefer
        };
        let s = signals(&[Signal::Keyword]);
        assert!((engine.score(&oa, &s, &prefer).open_access_bonus - 5.0).abs() < 1e-9);
        assert!(engine.score(&oa, &s, &neutral).open_access_bonus.abs() < 1e-9);
    }

    #[test]
    fn test_rank_orders_by_normalized_then_raw_then_name() {
        let fixture = Fixture::new();
        let empty = DisciplineProfile::default();
        let ctx = ScoringContext {
            profile: &empty,
            terms: &[],
            prefer_open_access: false,
        };
        let merged = vec![
            MergedJournal {
                journal: journal("B weak", 0, 0.0, None),
                signals_matched: signals(&[Signal::Keyword]),
            },
            MergedJournal {
                journal: journal("A strong", 300, 10.0, None),
                signals_matched: signals(&[Signal::Topic, Signal::Keyword]),
            },
            MergedJournal {
                journal: journal("A weak", 0, 0.0, None),
                signals_matched: signals(&[Signal::Keyword]),
            },
        ];
        let ranked = fixture.engine().rank(merged, &ctx);
        let names: Vec<&str> = ranked.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A strong", "A weak", "B weak"]);
        assert!(ranked
            .iter()
            .all(|c| (0.0..=1.0).contains(&c.normalized_score.get())));
    }
}
