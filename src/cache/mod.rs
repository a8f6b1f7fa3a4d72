//! Injected cache for repeated searches.
//!
//! The engine never owns ambient cache state; a [`QueryCache`] is handed to
//! it explicitly, keyed by [`Query::fingerprint`](crate::query::Query::fingerprint).
//! [`TtlQueryCache`] expires entries after a fixed TTL and, when full, evicts
//! expired entries first and then the oldest.

use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::engine::SearchResponse;

/// Cache collaborator for completed search responses.
pub trait QueryCache: Send + Sync {
    fn get(&self, key: &str) -> Option<SearchResponse>;
    fn insert(&self, key: String, response: SearchResponse);
}

/// Settings for [`TtlQueryCache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Attach a [`TtlQueryCache`] when the engine is built from config.
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: 3600,
            max_entries: 256,
        }
    }
}

#[derive(Debug)]
struct CachedResponse {
    response: SearchResponse,
    stored_at: Instant,
}

/// TTL + max-entries cache on a `DashMap`.
#[derive(Debug)]
pub struct TtlQueryCache {
    entries: DashMap<String, CachedResponse>,
    ttl: Duration,
    max_entries: usize,
}

impl TtlQueryCache {
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(Duration::from_secs(settings.ttl_secs), settings.max_entries)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &CachedResponse, now: Instant) -> bool {
        now.duration_since(entry.stored_at) >= self.ttl
    }

    fn make_room(&self, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry, now));

        while self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.stored_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
        debug!(
            evicted = before.saturating_sub(self.entries.len()),
            "Query cache eviction"
        );
    }
}

impl QueryCache for TtlQueryCache {
    fn get(&self, key: &str) -> Option<SearchResponse> {
        let now = Instant::now();
        let hit = self.entries.get(key).and_then(|entry| {
            (!self.is_expired(&entry, now)).then(|| entry.response.clone())
        });
        if hit.is_none() {
            self.entries.remove_if(key, |_, entry| self.is_expired(entry, now));
        }
        hit
    }

    fn insert(&self, key: String, response: SearchResponse) {
        let now = Instant::now();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.make_room(now);
        }
        self.entries.insert(
            key,
            CachedResponse {
                response,
                stored_at: now,
            },
        );
    }
}
