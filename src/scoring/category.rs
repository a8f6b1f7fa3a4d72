//! Display tiers.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::NormalizedScore;
use crate::retrieval::Signal;
use crate::source::JournalMetrics;

/// Display tier of a candidate. Every candidate gets exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TopTier,
    NicheSpecialist,
    MethodologyFocused,
    BroadScope,
}

impl Category {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::TopTier => "Top tier",
            Self::NicheSpecialist => "Niche specialist",
            Self::MethodologyFocused => "Methodology focused",
            Self::BroadScope => "Broad scope",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Thresholds for [`Categorizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoryThresholds {
    pub top_tier_min_score: f64,
    pub top_tier_min_h_index: u32,
    pub niche_max_works: u64,
    pub niche_min_score: f64,
    /// Journals at or above this size are broad regardless of signals.
    pub broad_min_works: u64,
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self {
            top_tier_min_score: 0.6,
            top_tier_min_h_index: 100,
            niche_max_works: 5_000,
            niche_min_score: 0.25,
            broad_min_works: 20_000,
        }
    }
}

/// Deterministic first-match-wins tier assignment.
///
/// 1. top tier: high score and high h-index
/// 2. broad scope: very large works count
/// 3. niche specialist: topic/subfield match, modest works count, decent score
/// 4. methodology focused: keyword match without discipline support
/// 5. broad scope otherwise
#[derive(Debug, Clone, Default)]
pub struct Categorizer {
    thresholds: CategoryThresholds,
}

impl Categorizer {
    #[must_use]
    pub fn new(thresholds: CategoryThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn categorize(
        &self,
        score: NormalizedScore,
        metrics: &JournalMetrics,
        signals: &BTreeSet<Signal>,
        discipline_boost: f64,
    ) -> Category {
        let t = &self.thresholds;
        let score = score.get();

        if score >= t.top_tier_min_score && metrics.h_index >= t.top_tier_min_h_index {
            return Category::TopTier;
        }
        if metrics.works_count >= t.broad_min_works {
            return Category::BroadScope;
        }

        let topical = signals.contains(&Signal::Topic) || signals.contains(&Signal::Subfield);
        if topical && metrics.works_count <= t.niche_max_works && score >= t.niche_min_score {
            return Category::NicheSpecialist;
        }

        let keyword_only = signals.len() == 1 && signals.contains(&Signal::Keyword);
        let unsupported_keyword = signals.contains(&Signal::Keyword) && discipline_boost <= 0.0;
        if keyword_only || unsupported_keyword {
            return Category::MethodologyFocused;
        }

        Category::BroadScope
    }
}
