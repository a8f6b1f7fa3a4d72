//! Concurrent retrieval fan-out over the three signals.
//!
//! Topic, subfield and keyword searches run concurrently in the caller's task
//! via `tokio::join!`, each bounded by its own timeout around a retry loop.
//! A failing or slow signal degrades to an empty list and is recorded in the
//! [`SignalOutcome`] report; it never fails the request. Because nothing is
//! spawned, dropping the fan-out future cancels every in-flight call.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::discipline::DisciplineProfile;
use crate::query::SearchTerm;
use crate::retry::{RetryPolicy, call_with_retry};
use crate::source::{BibliographicSource, SourceError, SourceJournal};

pub const DEFAULT_SIGNAL_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// One of the three independent retrieval strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Topic,
    Subfield,
    Keyword,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Topic, Signal::Subfield, Signal::Keyword];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Subfield => "subfield",
            Self::Keyword => "keyword",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a signal finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SignalStatus {
    Completed,
    /// All attempts failed; the signal contributes nothing.
    Failed { reason: String },
    /// The signal exceeded its time budget.
    TimedOut,
    /// Not run (no subfield detected, no topic ids or no terms).
    Skipped,
}

/// Per-signal report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalOutcome {
    pub signal: Signal,
    pub status: SignalStatus,
    /// Journals returned (0 unless completed).
    pub count: usize,
    pub attempts: u32,
}

/// Timeouts, paging and retry settings for the fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalSettings {
    pub signal_timeout_secs: u64,
    pub page_size: usize,
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            signal_timeout_secs: DEFAULT_SIGNAL_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            max_attempts: crate::retry::DEFAULT_MAX_ATTEMPTS,
            base_backoff_ms: 250,
        }
    }
}

impl RetrievalSettings {
    #[must_use]
    pub fn signal_timeout(&self) -> Duration {
        Duration::from_secs(self.signal_timeout_secs)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_attempts(
            self.max_attempts,
            Duration::from_millis(self.base_backoff_ms),
        )
    }
}

/// Journals returned by one signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalResults {
    pub signal: Signal,
    pub journals: Vec<SourceJournal>,
}

/// Everything the fan-out produced, ready for merging.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOut {
    pub results: Vec<SignalResults>,
    pub report: Vec<SignalOutcome>,
}

impl FanOut {
    #[must_use]
    pub fn total_journals(&self) -> usize {
        self.results.iter().map(|r| r.journals.len()).sum()
    }
}

/// Runs the three signals concurrently and waits for all of them.
#[instrument(skip_all, fields(source = source.name(), terms = terms.len()))]
pub async fn fan_out(
    source: &dyn BibliographicSource,
    profile: &DisciplineProfile,
    terms: &[SearchTerm],
    settings: &RetrievalSettings,
) -> FanOut {
    let policy = settings.retry_policy();
    let page = settings.page_size;
    let topic_ids = profile.topic_ids.as_slice();
    let subfield_id = profile.primary_subfield_id();

    let topic = async {
        if topic_ids.is_empty() {
            return skipped(Signal::Topic);
        }
        run_signal(Signal::Topic, settings, &policy, || {
            source.journals_by_topic(topic_ids, page)
        })
        .await
    };
    let subfield = async {
        let Some(subfield_id) = subfield_id else {
            return skipped(Signal::Subfield);
        };
        run_signal(Signal::Subfield, settings, &policy, || {
            source.journals_by_subfield(subfield_id, page)
        })
        .await
    };
    let keyword = async {
        if terms.is_empty() {
            return skipped(Signal::Keyword);
        }
        run_signal(Signal::Keyword, settings, &policy, || {
            source.journals_by_keyword(terms, page)
        })
        .await
    };

    let (topic, subfield, keyword) = tokio::join!(topic, subfield, keyword);

    let mut results = Vec::with_capacity(3);
    let mut report = Vec::with_capacity(3);
    for (signal_results, outcome) in [topic, subfield, keyword] {
        results.push(signal_results);
        report.push(outcome);
    }

    let fan_out = FanOut { results, report };
    info!(
        journals = fan_out.total_journals(),
        completed = fan_out
            .report
            .iter()
            .filter(|o| o.status == SignalStatus::Completed)
            .count(),
        "Retrieval fan-out finished"
    );
    fan_out
}

fn skipped(signal: Signal) -> (SignalResults, SignalOutcome) {
    debug!(%signal, "Signal skipped");
    (
        SignalResults {
            signal,
            journals: Vec::new(),
        },
        SignalOutcome {
            signal,
            status: SignalStatus::Skipped,
            count: 0,
            attempts: 0,
        },
    )
}

async fn run_signal<F, Fut>(
    signal: Signal,
    settings: &RetrievalSettings,
    policy: &RetryPolicy,
    call: F,
) -> (SignalResults, SignalOutcome)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Vec<SourceJournal>, SourceError>>,
{
    let mut attempts = 0;
    let outcome = tokio::time::timeout(
        settings.signal_timeout(),
        call_with_retry(policy, signal.as_str(), || {
            attempts += 1;
            call()
        }),
    )
    .await;

    let (mut journals, status) = match outcome {
        Ok((Ok(journals), _)) => (journals, SignalStatus::Completed),
        Ok((Err(error), _)) => {
            warn!(%signal, %error, attempts, "Signal failed; continuing without it");
            (
                Vec::new(),
                SignalStatus::Failed {
                    reason: error.to_string(),
                },
            )
        }
        Err(_) => {
            warn!(
                %signal,
                timeout_secs = settings.signal_timeout_secs,
                attempts,
                "Signal timed out; continuing without it"
            );
            (Vec::new(), SignalStatus::TimedOut)
        }
    };
    journals.truncate(settings.page_size);
    let count = journals.len();
    debug!(%signal, count, attempts, "Signal finished");

    (
        SignalResults { signal, journals },
        SignalOutcome {
            signal,
            status,
            count,
            attempts,
        },
    )
}
