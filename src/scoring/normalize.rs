//! Bounded score normalization.
//!
//! Raw scores are divided by a fixed ceiling and clamped to `[0,1]`. A
//! scale/clamp transform keeps normalization monotonic and independent of
//! which other candidates are in the result set, and re-applying it to
//! already-normalized scores changes nothing.

use serde::Serialize;
use tracing::warn;

/// Default divisor mapping raw scores into `[0,1]`.
pub const DEFAULT_NORMALIZATION_CEILING: f64 = 120.0;

/// A score guaranteed to lie in `[0,1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct NormalizedScore(f64);

impl NormalizedScore {
    pub const MIN: Self = Self(0.0);
    pub const MAX: Self = Self(1.0);

    /// Clamps `value` into range, logging any value that was out of range.
    #[must_use]
    pub fn clamped(value: f64) -> Self {
        Self(clamp_unit(value))
    }

    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }
}

/// Clamps into `[0,1]`. NaN becomes 0. Out-of-range inputs are an internal
/// defect and are logged.
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        warn!("Normalized score was NaN; clamping to 0");
        return 0.0;
    }
    if !(0.0..=1.0).contains(&value) {
        warn!(value, "Normalized score escaped [0,1]; clamping");
    }
    value.clamp(0.0, 1.0)
}

/// Scale/clamp normalizer with a stable ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    ceiling: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_NORMALIZATION_CEILING,
        }
    }
}

impl Normalizer {
    /// Creates a normalizer; a non-positive or non-finite ceiling falls back
    /// to the default.
    #[must_use]
    pub fn new(ceiling: f64) -> Self {
        if ceiling.is_finite() && ceiling > 0.0 {
            Self { ceiling }
        } else {
            warn!(ceiling, "Invalid normalization ceiling; using default");
            Self::default()
        }
    }

    #[must_use]
    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Maps one raw score into `[0,1]`.
    #[must_use]
    pub fn normalize(&self, raw: f64) -> NormalizedScore {
        if raw.is_nan() || raw < 0.0 {
            warn!(raw, "Raw score was negative or NaN; treating as 0");
            return NormalizedScore::MIN;
        }
        // Saturation at the ceiling is expected, not a violation.
        NormalizedScore((raw / self.ceiling).min(1.0))
    }

    #[must_use]
    pub fn normalize_all(&self, raw: &[f64]) -> Vec<NormalizedScore> {
        raw.iter().map(|r| self.normalize(*r)).collect()
    }

    /// Re-applies normalization to already-normalized scores: a no-op for
    /// every valid score.
    #[must_use]
    pub fn reapply(&self, scores: &[NormalizedScore]) -> Vec<NormalizedScore> {
        scores.iter().map(|s| NormalizedScore::clamped(s.0)).collect()
    }
}
