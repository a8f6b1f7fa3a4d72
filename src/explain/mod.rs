//! Deterministic, human-readable match explanations.
//!
//! Built from a candidate's [`ScoreComponents`] and the overlap between its
//! topics and the query's search terms. No external collaborator is needed,
//! so an explanation is always available even when a richer enrichment layer
//! is not.

use serde::{Deserialize, Serialize};

use crate::query::SearchTerm;
use crate::scoring::{CandidateJournal, ScoreComponents};
use crate::taxonomy::{contains_words, word_sequence};

pub const MAX_MATCH_DETAILS: usize = 4;
pub const MAX_MATCHED_TOPICS: usize = 5;

/// Short reasons a journal was recommended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub match_details: Vec<String>,
    pub matched_topics: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Component {
    Title,
    Discipline,
    Topic,
    Subfield,
    Keyword,
    Merge,
    Citations,
    HIndex,
    OpenAccess,
}

impl Component {
    /// Fixed order, used to break ties between equal contributions.
    const ALL: [Component; 9] = [
        Component::Title,
        Component::Discipline,
        Component::Topic,
        Component::Subfield,
        Component::Keyword,
        Component::Merge,
        Component::Citations,
        Component::HIndex,
        Component::OpenAccess,
    ];

    fn value(self, c: &ScoreComponents) -> f64 {
        match self {
            Self::Title => c.title_match,
            Self::Discipline => c.discipline_boost,
            Self::Topic => c.topic_match,
            Self::Subfield => c.subfield_match,
            Self::Keyword => c.keyword_match,
            Self::Merge => c.merge_bonus,
            Self::Citations => c.citation_contribution,
            Self::HIndex => c.h_index_contribution,
            Self::OpenAccess => c.open_access_bonus,
        }
    }
}

/// Produces [`Explanation`]s for scored candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplanationBuilder;

impl ExplanationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Explains `candidate` against the query's search terms.
    #[must_use]
    pub fn explain(&self, candidate: &CandidateJournal, terms: &[SearchTerm]) -> Explanation {
        Explanation {
            match_details: self.match_details(candidate, terms),
            matched_topics: self.matched_topics(candidate, terms),
        }
    }

    /// Fills `matched_topics` and `match_details` in place.
    pub fn annotate(&self, candidate: &mut CandidateJournal, terms: &[SearchTerm]) {
        let Explanation {
            match_details,
            matched_topics,
        } = self.explain(candidate, terms);
        candidate.match_details = match_details;
        candidate.matched_topics = matched_topics;
    }

    fn match_details(&self, candidate: &CandidateJournal, terms: &[SearchTerm]) -> Vec<String> {
        let components = &candidate.score_components;
        let mut ranked: Vec<(usize, Component, f64)> = Component::ALL
            .iter()
            .enumerate()
            .map(|(order, c)| (order, *c, c.value(components)))
            .filter(|(_, _, value)| *value > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));

        ranked
            .into_iter()
            .take(MAX_MATCH_DETAILS)
            .map(|(_, component, _)| describe(component, candidate, terms))
            .collect()
    }

    fn matched_topics(&self, candidate: &CandidateJournal, terms: &[SearchTerm]) -> Vec<String> {
        let term_words: Vec<Vec<String>> = terms.iter().map(|t| word_sequence(&t.text)).collect();
        let mut topics: Vec<_> = candidate
            .topics
            .iter()
            .filter(|topic| {
                let words = word_sequence(&topic.name);
                term_words.iter().any(|term| contains_words(&words, term))
            })
            .collect();
        topics.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

        let mut names: Vec<String> = Vec::new();
        for topic in topics {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&topic.name)) {
                names.push(topic.name.clone());
            }
            if names.len() == MAX_MATCHED_TOPICS {
                break;
            }
        }
        names
    }
}

fn describe(component: Component, candidate: &CandidateJournal, terms: &[SearchTerm]) -> String {
    match component {
        Component::Title => {
            let name = word_sequence(&candidate.name);
            terms
                .iter()
                .find(|t| contains_words(&name, &word_sequence(&t.text)))
                .map_or_else(
                    || "Journal title matches your manuscript".to_string(),
                    |t| format!("Journal title matches \"{}\"", t.text),
                )
        }
        Component::Discipline => "Publishes in your manuscript's discipline".to_string(),
        Component::Topic => "Publishes on the topics of similar works".to_string(),
        Component::Subfield => "Active in your detected subfield".to_string(),
        Component::Keyword => "Matches your manuscript keywords".to_string(),
        Component::Merge => format!(
            "Found by {} independent searches",
            candidate.signals_matched.len()
        ),
        Component::Citations => format!(
            "Recent articles average {:.1} citations",
            candidate.metrics.two_yr_mean_citedness
        ),
        Component::HIndex => format!("Established journal (h-index {})", candidate.metrics.h_index),
        Component::OpenAccess => "Open access".to_string(),
    }
}
