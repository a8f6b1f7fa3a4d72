//! Discipline detection from a sample of similar works.
//!
//! The detector asks the source for works resembling the manuscript and
//! builds a histogram over their primary subfield tags. The most frequent
//! subfield becomes the primary detection with confidence equal to its share
//! of the sample; other subfields above a minimum share become secondary
//! detections. An empty sample is not an error: it yields an empty profile,
//! which disables the subfield signal and the discipline boost downstream.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::query::SearchTerm;
use crate::retry::{RetryPolicy, call_with_retry};
use crate::source::{BibliographicSource, TaxonRef, Work};
use crate::taxonomy::Taxonomy;
use crate::terms::search_text;

/// Number of leading search terms sent to the similar-works lookup.
const SIMILAR_WORKS_QUERY_TERMS: usize = 8;

/// Tuning for discipline detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisciplineSettings {
    /// Similar works requested from the source.
    pub sample_size: usize,
    /// Minimum share of the sample for a secondary detection.
    pub secondary_min_share: f64,
    pub max_secondary: usize,
    /// Topic ids forwarded to the topic signal.
    pub topic_id_count: usize,
}

impl Default for DisciplineSettings {
    fn default() -> Self {
        Self {
            sample_size: 50,
            secondary_min_share: 0.15,
            max_secondary: 3,
            topic_id_count: 10,
        }
    }
}

/// A detected discipline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discipline {
    pub subfield_id: u32,
    pub subfield_name: String,
    pub field_id: Option<u32>,
    pub field_name: Option<String>,
    /// Share of the similar-works sample tagged with this subfield, in `[0,1]`.
    pub confidence: f64,
}

/// A ranked detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rank", rename_all = "snake_case")]
pub enum DisciplineDetection {
    Primary(Discipline),
    Secondary(Discipline),
}

impl DisciplineDetection {
    #[must_use]
    pub fn discipline(&self) -> &Discipline {
        match self {
            Self::Primary(d) | Self::Secondary(d) => d,
        }
    }

    #[must_use]
    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Primary(_))
    }
}

/// Detection results plus the topic ids that feed the topic signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisciplineProfile {
    /// Primary first, then secondaries by descending share.
    pub detections: Vec<DisciplineDetection>,
    pub topic_ids: Vec<String>,
    pub sample_size: usize,
}

impl DisciplineProfile {
    #[must_use]
    pub fn primary(&self) -> Option<&Discipline> {
        self.detections
            .iter()
            .find(|d| d.is_primary())
            .map(DisciplineDetection::discipline)
    }

    /// Confidence of the primary detection; 0 when nothing was detected.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.primary().map_or(0.0, |d| d.confidence)
    }

    #[must_use]
    pub fn primary_subfield_id(&self) -> Option<u32> {
        self.primary().map(|d| d.subfield_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[derive(Debug, Default)]
struct SubfieldTally<'w> {
    count: usize,
    citations: u64,
    first_seen: usize,
    subfield: Option<&'w TaxonRef>,
    field: Option<&'w TaxonRef>,
}

/// Derives a [`DisciplineProfile`] from similar works.
#[derive(Debug, Clone, Copy)]
pub struct DisciplineDetector<'a> {
    taxonomy: &'a Taxonomy,
    settings: &'a DisciplineSettings,
}

impl<'a> DisciplineDetector<'a> {
    #[must_use]
    pub fn new(taxonomy: &'a Taxonomy, settings: &'a DisciplineSettings) -> Self {
        Self { taxonomy, settings }
    }

    /// Samples similar works from `source` and builds the profile.
    ///
    /// Source failures degrade to an empty profile.
    #[instrument(skip_all, fields(source = source.name(), terms = terms.len()))]
    pub async fn detect(
        &self,
        source: &dyn BibliographicSource,
        terms: &[SearchTerm],
        retry: &RetryPolicy,
    ) -> DisciplineProfile {
        let text = search_text(terms, SIMILAR_WORKS_QUERY_TERMS);
        if text.is_empty() {
            warn!("No search terms for discipline detection");
            return DisciplineProfile::default();
        }

        let (result, attempts) = call_with_retry(retry, "similar_works", || {
            source.similar_works_by_text(&text, self.settings.sample_size)
        })
        .await;

        match result {
            Ok(works) => self.profile_from_works(&works),
            Err(error) => {
                warn!(%error, attempts, "Similar-works lookup failed; discipline unknown");
                DisciplineProfile::default()
            }
        }
    }

    /// Builds a profile from an already-fetched sample. Pure.
    #[must_use]
    pub fn profile_from_works(&self, works: &[Work]) -> DisciplineProfile {
        let sample_size = works.len().min(self.settings.sample_size.max(1));
        let works = &works[..sample_size];
        if works.is_empty() {
            warn!("Similar-works sample is empty; discipline boost disabled");
            return DisciplineProfile::default();
        }

        let mut tallies: HashMap<u32, SubfieldTally<'_>> = HashMap::new();
        for (position, work) in works.iter().enumerate() {
            let Some(subfield) = &work.subfield else {
                continue;
            };
            let tally = tallies.entry(subfield.id).or_insert_with(|| SubfieldTally {
                first_seen: position,
                subfield: Some(subfield),
                field: work.field.as_ref(),
                ..SubfieldTally::default()
            });
            tally.count += 1;
            tally.citations = tally.citations.saturating_add(work.cited_by_count);
            if tally.field.is_none() {
                tally.field = work.field.as_ref();
            }
        }

        let mut ranked: Vec<(u32, SubfieldTally<'_>)> = tallies.into_iter().collect();
        ranked.sort_by(|(a_id, a), (b_id, b)| {
            b.count
                .cmp(&a.count)
                .then(b.citations.cmp(&a.citations))
                .then(a.first_seen.cmp(&b.first_seen))
                .then(a_id.cmp(b_id))
        });

        #[allow(clippy::cast_precision_loss)]
        let share = |count: usize| count as f64 / sample_size as f64;

        let mut detections = Vec::new();
        let mut ranked = ranked.into_iter();
        if let Some((id, tally)) = ranked.next() {
            detections.push(DisciplineDetection::Primary(
                self.discipline(id, &tally, share(tally.count)),
            ));
        }
        detections.extend(
            ranked
                .filter(|(_, tally)| share(tally.count) >= self.settings.secondary_min_share)
                .take(self.settings.max_secondary)
                .map(|(id, tally)| {
                    DisciplineDetection::Secondary(self.discipline(id, &tally, share(tally.count)))
                }),
        );

        let topic_ids = self.top_topic_ids(works);
        let profile = DisciplineProfile {
            detections,
            topic_ids,
            sample_size,
        };

        if let Some(primary) = profile.primary() {
            info!(
                subfield_id = primary.subfield_id,
                confidence = primary.confidence,
                secondaries = profile.detections.len() - 1,
                sample_size,
                "Discipline detected"
            );
        } else {
            warn!(sample_size, "No subfield tags in similar works; discipline boost disabled");
        }
        profile
    }

    fn discipline(&self, subfield_id: u32, tally: &SubfieldTally<'_>, confidence: f64) -> Discipline {
        let known = self.taxonomy.subfield(subfield_id);
        let subfield_name = known
            .map(|s| s.name.clone())
            .or_else(|| tally.subfield.map(|s| s.name.clone()))
            .unwrap_or_default();

        let (field_id, field_name) = match self.taxonomy.field_of(subfield_id) {
            Some(field) => (Some(field.id), Some(field.name.clone())),
            None => (
                tally.field.map(|f| f.id),
                tally.field.map(|f| f.name.clone()),
            ),
        };

        Discipline {
            subfield_id,
            subfield_name,
            field_id,
            field_name,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    fn top_topic_ids(&self, works: &[Work]) -> Vec<String> {
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        let mut order = 0;
        for topic in works.iter().flat_map(|w| w.topic_ids.iter()) {
            let entry = counts.entry(topic.as_str()).or_insert_with(|| {
                order += 1;
                (0, order)
            });
            entry.0 += 1;
        }

        let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|(_, (a_count, a_order)), (_, (b_count, b_order))| {
            b_count.cmp(a_count).then(a_order.cmp(b_order))
        });
        let topic_ids: Vec<String> = ranked
            .into_iter()
            .take(self.settings.topic_id_count)
            .map(|(id, _)| id.to_string())
            .collect();
        debug!(topics = topic_ids.len(), "Topic ids selected");
        topic_ids
    }
}
