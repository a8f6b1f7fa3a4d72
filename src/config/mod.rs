//! Engine configuration and TOML file loading.
//!
//! Every numeric setting is a tuning default. A config file only needs to
//! mention what it overrides:
//!
//! ```toml
//! [weights]
//! discipline_boost = 30.0
//!
//! [retrieval]
//! signal_timeout_secs = 5
//! ```

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::CacheSettings;
use crate::discipline::DisciplineSettings;
use crate::query::QueryLimits;
use crate::retrieval::RetrievalSettings;
use crate::scoring::{
    CategoryThresholds, DEFAULT_NORMALIZATION_CEILING, Normalizer, ScoringWeights,
};
use crate::source::{DEFAULT_OPENALEX_BASE_URL, HttpTimeouts};
use crate::taxonomy::Taxonomy;

const CONFIG_DIR_NAME: &str = "journal-matcher";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Where and how to reach the bibliographic source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSettings {
    pub base_url: String,
    /// Contact email for the polite pool.
    pub mailto: Option<String>,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        let timeouts = HttpTimeouts::default();
        Self {
            base_url: DEFAULT_OPENALEX_BASE_URL.to_string(),
            mailto: None,
            connect_timeout_secs: timeouts.connect_secs,
            read_timeout_secs: timeouts.read_secs,
        }
    }
}

impl SourceSettings {
    #[must_use]
    pub fn http_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect_secs: self.connect_timeout_secs,
            read_secs: self.read_timeout_secs,
        }
    }
}

/// All engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub weights: ScoringWeights,
    pub normalization_ceiling: f64,
    pub categories: CategoryThresholds,
    pub discipline: DisciplineSettings,
    pub retrieval: RetrievalSettings,
    pub query: QueryLimits,
    pub source: SourceSettings,
    pub cache: CacheSettings,
    /// Replacement taxonomy JSON; the embedded one is used when unset.
    pub taxonomy_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            normalization_ceiling: DEFAULT_NORMALIZATION_CEILING,
            categories: CategoryThresholds::default(),
            discipline: DisciplineSettings::default(),
            retrieval: RetrievalSettings::default(),
            query: QueryLimits::default(),
            source: SourceSettings::default(),
            cache: CacheSettings::default(),
            taxonomy_file: None,
        }
    }
}

impl EngineConfig {
    /// Parses and validates TOML.
    ///
    /// # Errors
    /// Returns an error on syntax errors, unknown keys or out-of-range values.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Invalid engine config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a config file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        validate_range("retrieval.signal_timeout_secs", r.signal_timeout_secs, 1, 30)?;
        validate_range("retrieval.page_size", r.page_size, 1, 200)?;
        validate_range("retrieval.max_attempts", r.max_attempts, 1, 5)?;
        validate_range("retrieval.base_backoff_ms", r.base_backoff_ms, 0, 10_000)?;

        let d = &self.discipline;
        validate_range("discipline.sample_size", d.sample_size, 1, 200)?;
        validate_range("discipline.max_secondary", d.max_secondary, 0, 10)?;
        validate_range("discipline.topic_id_count", d.topic_id_count, 1, 50)?;
        validate_fraction("discipline.secondary_min_share", d.secondary_min_share)?;

        let w = &self.weights;
        for (name, value) in [
            ("weights.topic_bonus", w.topic_bonus),
            ("weights.subfield_bonus", w.subfield_bonus),
            ("weights.keyword_bonus", w.keyword_bonus),
            ("weights.title_bonus", w.title_bonus),
            ("weights.h_index_coefficient", w.h_index_coefficient),
            ("weights.citedness_coefficient", w.citedness_coefficient),
            ("weights.citedness_cap", w.citedness_cap),
            ("weights.discipline_boost", w.discipline_boost),
            ("weights.merge_factor_per_signal", w.merge_factor_per_signal),
            ("weights.open_access_bonus", w.open_access_bonus),
        ] {
            validate_non_negative(name, value)?;
        }
        validate_fraction("weights.secondary_boost_factor", w.secondary_boost_factor)?;

        if !(self.normalization_ceiling.is_finite() && self.normalization_ceiling > 0.0) {
            bail!(
                "Invalid config value for `normalization_ceiling`: {}. Expected a positive number",
                self.normalization_ceiling
            );
        }

        let c = &self.categories;
        validate_fraction("categories.top_tier_min_score", c.top_tier_min_score)?;
        validate_fraction("categories.niche_min_score", c.niche_min_score)?;

        let q = &self.query;
        validate_range("query.min_title_chars", q.min_title_chars, 1, 500)?;
        validate_range("query.min_abstract_chars", q.min_abstract_chars, 1, 10_000)?;
        validate_range("query.max_keywords", q.max_keywords, 1, 100)?;

        validate_range("cache.max_entries", self.cache.max_entries, 1, 100_000)?;
        validate_range("cache.ttl_secs", self.cache.ttl_secs, 1, 86_400)?;

        let s = &self.source;
        if !(s.base_url.starts_with("http://") || s.base_url.starts_with("https://")) {
            bail!(
                "Invalid config value for `source.base_url`: '{}'. Expected an http(s) URL",
                s.base_url
            );
        }
        validate_range("source.connect_timeout_secs", s.connect_timeout_secs, 1, 3600)?;
        validate_range("source.read_timeout_secs", s.read_timeout_secs, 1, 3600)?;
        Ok(())
    }

    #[must_use]
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.normalization_ceiling)
    }

    /// Loads the configured taxonomy, or the embedded default.
    ///
    /// # Errors
    /// Returns an error if the taxonomy file is missing or invalid.
    pub fn load_taxonomy(&self) -> Result<Taxonomy> {
        match &self.taxonomy_file {
            Some(path) => Taxonomy::load(path)
                .with_context(|| format!("Failed to load taxonomy '{}'", path.display())),
            None => Taxonomy::embedded().context("Embedded taxonomy is invalid"),
        }
    }
}

fn validate_range<T>(field: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

fn validate_fraction(field: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 0.0..=1.0");
    }
    Ok(())
}

fn validate_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        bail!("Invalid config value for `{field}`: {value}. Expected a non-negative number");
    }
    Ok(())
}

/// A resolved config and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: Option<PathBuf>,
    pub config: EngineConfig,
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/journal-matcher/config.toml`
/// 2. `$HOME/.config/journal-matcher/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(
        std::env::var_os("XDG_CONFIG_HOME"),
        std::env::var_os("HOME"),
    )
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    let non_empty = |value: Option<OsString>| value.filter(|v| !v.is_empty());
    if let Some(xdg) = non_empty(xdg_config_home) {
        return Some(PathBuf::from(xdg).join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    let home = non_empty(home)?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

/// Loads `explicit` if given, else the default path if it exists, else defaults.
///
/// # Errors
/// Returns an error if a config file exists but cannot be loaded.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: EngineConfig::load(path)?,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(existing) if existing.exists() => {
            let config = EngineConfig::load(existing)?;
            debug!(path = %existing.display(), "Loaded engine config");
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: EngineConfig::default(),
            loaded_from_file: false,
        }),
    }
}
