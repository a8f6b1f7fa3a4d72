//! Merging and deduplication of per-signal candidate lists.
//!
//! Journals are keyed by their stable source id; journals without an id fall
//! back to a normalized `name|publisher` key. Each merged journal records the
//! set of signals that returned it, which drives the multiplicative merge
//! bonus in scoring.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, instrument};

use crate::retrieval::{Signal, SignalResults};
use crate::source::{JournalTopic, SourceJournal};
use crate::taxonomy::word_sequence;

/// A deduplicated journal and the signals that found it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedJournal {
    pub journal: SourceJournal,
    /// Never empty.
    pub signals_matched: BTreeSet<Signal>,
}

/// Normalized `name|publisher` key used when a journal has no id.
#[must_use]
pub fn name_key(journal: &SourceJournal) -> String {
    let mut name = word_sequence(&journal.name);
    if name.first().is_some_and(|w| w == "the") {
        name.remove(0);
    }
    let publisher = journal
        .publisher
        .as_deref()
        .map(word_sequence)
        .unwrap_or_default();
    format!("{}|{}", name.join(" "), publisher.join(" "))
}

fn id_key(journal: &SourceJournal) -> Option<String> {
    let id = journal.id.trim();
    (!id.is_empty()).then(|| id.to_ascii_lowercase())
}

/// Unifies per-signal lists into one deduplicated list in first-seen order.
#[instrument(skip_all, fields(lists = per_signal.len()))]
#[must_use]
pub fn merge(per_signal: Vec<SignalResults>) -> Vec<MergedJournal> {
    let mut merged: Vec<MergedJournal> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut incoming = 0usize;

    for SignalResults { signal, journals } in per_signal {
        for journal in journals {
            incoming += 1;
            let id = id_key(&journal);
            let name = name_key(&journal);

            let existing = id
                .as_ref()
                .and_then(|id| by_id.get(id).copied())
                .or_else(|| {
                    by_name.get(&name).copied().filter(|&idx| {
                        id.is_none() || id_key(&merged[idx].journal).is_none()
                    })
                });

            let idx = if let Some(idx) = existing {
                let entry = &mut merged[idx];
                entry.signals_matched.insert(signal);
                absorb(&mut entry.journal, journal);
                idx
            } else {
                merged.push(MergedJournal {
                    journal,
                    signals_matched: BTreeSet::from([signal]),
                });
                merged.len() - 1
            };

            if let Some(id) = id {
                by_id.entry(id).or_insert(idx);
            }
            by_name.entry(name).or_insert(idx);
        }
    }

    debug!(incoming, unique = merged.len(), "Candidates merged");
    merged
}

/// Folds a duplicate record into `target`, keeping the richest metadata.
fn absorb(target: &mut SourceJournal, other: SourceJournal) {
    if target.id.trim().is_empty() {
        target.id = other.id;
    }
    if target.issn.is_none() {
        target.issn = other.issn;
    }
    if target.publisher.is_none() {
        target.publisher = other.publisher;
    }
    if target.apc_usd.is_none() {
        target.apc_usd = other.apc_usd;
    }
    target.is_open_access |= other.is_open_access;
    target.metrics.h_index = target.metrics.h_index.max(other.metrics.h_index);
    target.metrics.works_count = target.metrics.works_count.max(other.metrics.works_count);
    target.metrics.two_yr_mean_citedness = target
        .metrics
        .two_yr_mean_citedness
        .max(other.metrics.two_yr_mean_citedness);
    union_topics(&mut target.topics, other.topics);
}

fn union_topics(target: &mut Vec<JournalTopic>, other: Vec<JournalTopic>) {
    for topic in other {
        match target.iter_mut().find(|t| t.id == topic.id) {
            Some(existing) => existing.count = existing.count.max(topic.count),
            None => target.push(topic),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::JournalMetrics;

    fn journal(id: &str, name: &str, publisher: Option<&str>) -> SourceJournal {
        SourceJournal {
            id: id.to_string(),
            name: name.to_string(),
            issn: None,
            publisher: publisher.map(ToString::to_string),
            metrics: JournalMetrics::default(),
            is_open_access: false,
            apc_usd: None,
            topics: Vec::new(),
        }
    }

    fn results(signal: Signal, journals: Vec<SourceJournal>) -> SignalResults {
        SignalResults { signal, journals }
    }

    #[test]
    fn test_same_id_across_signals_merges_and_unions_signals() {
        let merged = merge(vec![
            results(Signal::Topic, vec![journal("S1", "Medical Image Analysis", None)]),
            results(Signal::Subfield, vec![]),
            results(Signal::Keyword, vec![journal("S1", "Medical Image Analysis", None)]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].signals_matched,
            BTreeSet::from([Signal::Topic, Signal::Keyword])
        );
    }

    #[test]
    fn test_missing_id_falls_back_to_name_and_publisher() {
        let merged = merge(vec![
            results(Signal::Topic, vec![journal("S9", "The Lancet Oncology", Some("Elsevier BV"))]),
            results(Signal::Keyword, vec![journal("", "lancet  oncology", Some("elsevier bv"))]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].journal.id, "S9");
        assert_eq!(merged[0].signals_matched.len(), 2);
    }

    #[test]
    fn test_distinct_ids_with_same_name_stay_separate() {
        let merged = merge(vec![
            results(Signal::Topic, vec![journal("S1", "Cancers", Some("MDPI"))]),
            results(Signal::Keyword, vec![journal("S2", "Cancers", Some("MDPI"))]),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_absorb_keeps_richest_metadata_and_unions_topics() {
        let mut a = journal("S1", "Radiology", None);
        a.metrics.h_index = 10;
        a.topics.push(JournalTopic {
            id: "T1".to_string(),
            name: "Imaging".to_string(),
            subfield_id: Some(2741),
            field_id: Some(27),
            count: 5,
        });
        let mut b = journal("S1", "Radiology", Some("RSNA"));
        b.metrics.h_index = 300;
        b.is_open_access = true;
        b.topics.push(JournalTopic {
            id: "T1".to_string(),
            name: "Imaging".to_string(),
            subfield_id: Some(2741),
            field_id: Some(27),
            count: 50,
        });
        b.topics.push(JournalTopic {
            id: "T2".to_string(),
            name: "Oncology".to_string(),
            subfield_id: Some(2730),
            field_id: Some(27),
            count: 1,
        });

        let merged = merge(vec![
            results(Signal::Subfield, vec![a]),
            results(Signal::Keyword, vec![b]),
        ]);
        let journal = &merged[0].journal;
        assert_eq!(journal.metrics.h_index, 300);
        assert_eq!(journal.publisher.as_deref(), Some("RSNA"));
        assert!(journal.is_open_access);
        assert_eq!(journal.topics.len(), 2);
        assert_eq!(journal.topics[0].count, 50);
    }

    #[test]
    fn test_duplicates_within_one_signal_collapse() {
        let merged = merge(vec![results(
            Signal::Keyword,
            vec![journal("S1", "A", None), journal("s1", "A", None)],
        )]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].signals_matched, BTreeSet::from([Signal::Keyword]));
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(merge(Vec::new()).is_empty());
        let all_empty = Signal::ALL.iter().map(|s| results(*s, Vec::new())).collect();
        assert!(merge(all_empty).is_empty());
    }

    #[test]
    fn test_name_key_ignores_case_punctuation_and_leading_article() {
        assert_eq!(
            name_key(&journal("", "The Journal of Clinical Oncology", Some("ASCO"))),
            name_key(&journal("", "journal of clinical-oncology", Some("asco")))
        );
    }
}
