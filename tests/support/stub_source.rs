//! In-memory `BibliographicSource` with scripted per-call behavior.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use journal_matcher_core::query::SearchTerm;
use journal_matcher_core::source::{
    BibliographicSource, JournalMetrics, JournalTopic, SourceError, SourceJournal, TaxonRef, Work,
};

/// What one stubbed endpoint does when called.
#[derive(Debug, Clone)]
pub enum Behavior<T> {
    Return(T),
    /// Fails every attempt with this HTTP status.
    Fail(u16),
    /// Never completes; counts a drop when the call is cancelled.
    Hang,
}

impl<T> Default for Behavior<T>
where
    T: Default,
{
    fn default() -> Self {
        Self::Return(T::default())
    }
}

#[derive(Debug, Default)]
pub struct StubSource {
    pub works: Behavior<Vec<Work>>,
    pub topic: Behavior<Vec<SourceJournal>>,
    pub subfield: Behavior<Vec<SourceJournal>>,
    pub keyword: Behavior<Vec<SourceJournal>>,
    pub by_id: HashMap<String, SourceJournal>,
    calls: AtomicUsize,
    cancelled: Arc<AtomicUsize>,
    subfield_ids: Mutex<Vec<u32>>,
    topic_ids: Mutex<Vec<String>>,
}

/// Increments a counter when a hanging call is dropped.
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl StubSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_works(mut self, works: Vec<Work>) -> Self {
        self.works = Behavior::Return(works);
        self
    }

    pub fn with_topic(mut self, behavior: Behavior<Vec<SourceJournal>>) -> Self {
        self.topic = behavior;
        self
    }

    pub fn with_subfield(mut self, behavior: Behavior<Vec<SourceJournal>>) -> Self {
        self.subfield = behavior;
        self
    }

    pub fn with_keyword(mut self, behavior: Behavior<Vec<SourceJournal>>) -> Self {
        self.keyword = behavior;
        self
    }

    pub fn with_journal(mut self, journal: SourceJournal) -> Self {
        self.by_id.insert(journal.id.clone(), journal);
        self
    }

    /// Total calls across every endpoint.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Hanging calls that were dropped before completing.
    pub fn cancelled_calls(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn subfield_ids_queried(&self) -> Vec<u32> {
        self.subfield_ids.lock().map(|ids| ids.clone()).unwrap_or_default()
    }

    pub fn topic_ids_queried(&self) -> Vec<String> {
        self.topic_ids.lock().map(|ids| ids.clone()).unwrap_or_default()
    }

    async fn play<T: Clone>(&self, endpoint: &str, behavior: &Behavior<T>) -> Result<T, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match behavior {
            Behavior::Return(value) => Ok(value.clone()),
            Behavior::Fail(status) => Err(SourceError::http_status(endpoint, *status, None)),
            Behavior::Hang => {
                let _guard = DropCounter(Arc::clone(&self.cancelled));
                std::future::pending::<()>().await;
                Err(SourceError::network(endpoint, "unreachable"))
            }
        }
    }
}

#[async_trait]
impl BibliographicSource for StubSource {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn similar_works_by_text(&self, _text: &str, limit: usize) -> Result<Vec<Work>, SourceError> {
        let mut works = self.play("works", &self.works).await?;
        works.truncate(limit);
        Ok(works)
    }

    async fn journals_by_topic(
        &self,
        topic_ids: &[String],
        _limit: usize,
    ) -> Result<Vec<SourceJournal>, SourceError> {
        if let Ok(mut seen) = self.topic_ids.lock() {
            seen.extend(topic_ids.iter().cloned());
        }
        self.play("sources/topic", &self.topic).await
    }

    async fn journals_by_subfield(
        &self,
        subfield_id: u32,
        _limit: usize,
    ) -> Result<Vec<SourceJournal>, SourceError> {
        if let Ok(mut seen) = self.subfield_ids.lock() {
            seen.push(subfield_id);
        }
        self.play("sources/subfield", &self.subfield).await
    }

    async fn journals_by_keyword(
        &self,
        _terms: &[SearchTerm],
        _limit: usize,
    ) -> Result<Vec<SourceJournal>, SourceError> {
        self.play("sources/search", &self.keyword).await
    }

    async fn journal_by_id(&self, id: &str) -> Result<Option<SourceJournal>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.by_id.get(id).cloned())
    }
}

/// Subfield ids and names from the embedded taxonomy.
pub const ONCOLOGY: (u32, &str, u32, &str) = (2730, "Oncology", 27, "Medicine");
pub const RADIOLOGY: (u32, &str, u32, &str) = (
    2741,
    "Radiology, Nuclear Medicine and Imaging",
    27,
    "Medicine",
);
pub const ARTIFICIAL_INTELLIGENCE: (u32, &str, u32, &str) =
    (1702, "Artificial Intelligence", 17, "Computer Science");
pub const SOCIOLOGY: (u32, &str, u32, &str) = (3312, "Sociology and Political Science", 33, "Social Sciences");

/// `count` works tagged with one subfield.
pub fn works_in(subfield: (u32, &str, u32, &str), count: usize, cited_by: u64) -> Vec<Work> {
    let (subfield_id, subfield_name, field_id, field_name) = subfield;
    (0..count)
        .map(|i| Work {
            id: format!("W{subfield_id}-{i}"),
            title: format!("Work {i}"),
            cited_by_count: cited_by,
            subfield: Some(TaxonRef {
                id: subfield_id,
                name: subfield_name.to_string(),
            }),
            field: Some(TaxonRef {
                id: field_id,
                name: field_name.to_string(),
            }),
            topic_ids: vec![format!("T{subfield_id}")],
        })
        .collect()
}

/// Journal builder for stubbed responses.
#[derive(Debug, Clone)]
pub struct JournalBuilder {
    journal: SourceJournal,
}

pub fn journal(id: &str, name: &str) -> JournalBuilder {
    JournalBuilder {
        journal: SourceJournal {
            id: id.to_string(),
            name: name.to_string(),
            issn: None,
            publisher: None,
            metrics: JournalMetrics::default(),
            is_open_access: false,
            apc_usd: None,
            topics: Vec::new(),
        },
    }
}

impl JournalBuilder {
    pub fn metrics(mut self, h_index: u32, works_count: u64, citedness: f64) -> Self {
        self.journal.metrics = JournalMetrics {
            h_index,
            works_count,
            two_yr_mean_citedness: citedness,
        };
        self
    }

    pub fn topic(mut self, name: &str, subfield_id: u32, count: u64) -> Self {
        self.journal.topics.push(JournalTopic {
            id: format!("T-{}", self.journal.topics.len()),
            name: name.to_string(),
            subfield_id: Some(subfield_id),
            field_id: Some(subfield_id / 100),
            count,
        });
        self
    }

    pub fn open_access(mut self) -> Self {
        self.journal.is_open_access = true;
        self
    }

    pub fn publisher(mut self, publisher: &str) -> Self {
        self.journal.publisher = Some(publisher.to_string());
        self
    }

    pub fn build(self) -> SourceJournal {
        self.journal
    }
}
