//! OpenAlex implementation of [`BibliographicSource`].
//!
//! Uses the public REST API: `/works` for the similar-works sample and
//! `/sources` (filtered to `type:journal`) for the three retrieval signals.
//! Requests carry a `mailto` parameter for OpenAlex's polite pool when one
//! is configured.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::query::SearchTerm;
use crate::terms::search_text;
use crate::user_agent::default_source_user_agent;

use super::{
    BibliographicSource, HttpTimeouts, JournalMetrics, JournalTopic, SourceError, SourceJournal,
    TaxonRef, Work, build_source_http_client, parse_retry_after,
};

/// Default OpenAlex API base URL.
pub const DEFAULT_OPENALEX_BASE_URL: &str = "https://api.openalex.org";

/// OpenAlex caps `per-page` at 200.
const MAX_PER_PAGE: usize = 200;

/// Number of leading terms sent to the keyword search.
const KEYWORD_SEARCH_TERMS: usize = 6;

const OPENALEX_ID_PREFIX: &str = "https://openalex.org/";

const WORK_FIELDS: &str = "id,display_name,cited_by_count,primary_topic,topics";
const SOURCE_FIELDS: &str =
    "id,display_name,issn_l,host_organization_name,works_count,summary_stats,is_oa,apc_usd,topics";

// ==================== OpenAlex API Response Types ====================

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct OaWork {
    id: String,
    display_name: Option<String>,
    cited_by_count: Option<u64>,
    primary_topic: Option<OaTopic>,
    #[serde(default)]
    topics: Option<Vec<OaTopic>>,
}

#[derive(Debug, Deserialize)]
struct OaTopic {
    id: String,
    display_name: Option<String>,
    count: Option<u64>,
    subfield: Option<OaTaxon>,
    field: Option<OaTaxon>,
}

#[derive(Debug, Deserialize)]
struct OaTaxon {
    id: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct OaSource {
    id: Option<String>,
    display_name: Option<String>,
    issn_l: Option<String>,
    host_organization_name: Option<String>,
    works_count: Option<u64>,
    summary_stats: Option<OaSummaryStats>,
    is_oa: Option<bool>,
    apc_usd: Option<u32>,
    #[serde(default)]
    topics: Option<Vec<OaTopic>>,
}

#[derive(Debug, Deserialize)]
struct OaSummaryStats {
    h_index: Option<u32>,
    #[serde(rename = "2yr_mean_citedness")]
    two_yr_mean_citedness: Option<f64>,
}

// ==================== OpenAlexSource ====================

/// Bibliographic source backed by the OpenAlex REST API.
pub struct OpenAlexSource {
    client: Client,
    base_url: String,
    mailto: Option<String>,
}

impl OpenAlexSource {
    /// Creates a source against the public OpenAlex API.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the mailto is malformed or the HTTP client
    /// cannot be built.
    #[tracing::instrument(skip_all)]
    pub fn new(mailto: Option<String>, timeouts: HttpTimeouts) -> Result<Self, SourceError> {
        Self::with_base_url(DEFAULT_OPENALEX_BASE_URL, mailto, timeouts)
    }

    /// Creates a source with a custom base URL (wiremock in tests, mirrors in
    /// deployments).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the mailto is malformed or the HTTP client
    /// cannot be built.
    #[tracing::instrument(skip_all, fields(base_url = %base_url.as_ref()))]
    pub fn with_base_url(
        base_url: impl AsRef<str>,
        mailto: Option<String>,
        timeouts: HttpTimeouts,
    ) -> Result<Self, SourceError> {
        let mailto = mailto
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        if let Some(mailto) = &mailto
            && mailto.chars().any(char::is_control)
        {
            return Err(SourceError::client_build(
                "openalex",
                "mailto contains invalid control characters",
            ));
        }

        let client = build_source_http_client("openalex", &default_source_user_agent(), timeouts)?;
        Ok(Self {
            client,
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            mailto,
        })
    }

    fn build_url(&self, path: &str, params: &[(&str, String)]) -> String {
        let mut query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect();
        if let Some(mailto) = &self.mailto {
            query.push(format!("mailto={}", urlencoding::encode(mailto)));
        }
        if query.is_empty() {
            format!("{}/{path}", self.base_url)
        } else {
            format!("{}/{path}?{}", self.base_url, query.join("&"))
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str, url: &str) -> Result<T, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(endpoint, &e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            debug!(endpoint, status = status.as_u16(), ?retry_after, "OpenAlex API error");
            return Err(SourceError::http_status(
                endpoint,
                status.as_u16(),
                retry_after,
            ));
        }

        response.json::<T>().await.map_err(|e| {
            warn!(endpoint, error = %e, "Failed to parse OpenAlex response JSON");
            SourceError::decode(endpoint, &e.to_string())
        })
    }

    async fn fetch_journals(
        &self,
        params: &[(&str, String)],
    ) -> Result<Vec<SourceJournal>, SourceError> {
        let url = self.build_url("sources", params);
        let body: ListResponse<OaSource> = self.fetch("sources", &url).await?;
        let journals: Vec<SourceJournal> =
            body.results.into_iter().filter_map(convert_source).collect();
        debug!(count = journals.len(), "OpenAlex journals fetched");
        Ok(journals)
    }
}

impl std::fmt::Debug for OpenAlexSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAlexSource")
            .field("base_url", &self.base_url)
            .field("mailto", &self.mailto)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BibliographicSource for OpenAlexSource {
    fn name(&self) -> &'static str {
        "openalex"
    }

    #[tracing::instrument(skip(self, text), fields(source = "openalex", text_len = text.len()))]
    async fn similar_works_by_text(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<Work>, SourceError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let url = self.build_url(
            "works",
            &[
                ("search", text.to_string()),
                ("per-page", per_page(limit)),
                ("select", WORK_FIELDS.to_string()),
            ],
        );
        let body: ListResponse<OaWork> = self.fetch("works", &url).await?;
        let works: Vec<Work> = body.results.into_iter().map(convert_work).collect();
        debug!(count = works.len(), "OpenAlex similar works fetched");
        Ok(works)
    }

    #[tracing::instrument(skip(self, topic_ids), fields(source = "openalex", topics = topic_ids.len()))]
    async fn journals_by_topic(
        &self,
        topic_ids: &[String],
        limit: usize,
    ) -> Result<Vec<SourceJournal>, SourceError> {
        if topic_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = format!("type:journal,topics.id:{}", topic_ids.join("|"));
        self.fetch_journals(&[
            ("filter", filter),
            ("per-page", per_page(limit)),
            ("select", SOURCE_FIELDS.to_string()),
        ])
        .await
    }

    #[tracing::instrument(skip(self), fields(source = "openalex"))]
    async fn journals_by_subfield(
        &self,
        subfield_id: u32,
        limit: usize,
    ) -> Result<Vec<SourceJournal>, SourceError> {
        let filter = format!("type:journal,topics.subfield.id:{subfield_id}");
        self.fetch_journals(&[
            ("filter", filter),
            ("per-page", per_page(limit)),
            ("select", SOURCE_FIELDS.to_string()),
        ])
        .await
    }

    #[tracing::instrument(skip(self, terms), fields(source = "openalex", terms = terms.len()))]
    async fn journals_by_keyword(
        &self,
        terms: &[SearchTerm],
        limit: usize,
    ) -> Result<Vec<SourceJournal>, SourceError> {
        let text = search_text(terms, KEYWORD_SEARCH_TERMS);
        if text.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_journals(&[
            ("search", text),
            ("filter", "type:journal".to_string()),
            ("per-page", per_page(limit)),
            ("select", SOURCE_FIELDS.to_string()),
        ])
        .await
    }

    #[tracing::instrument(skip(self), fields(source = "openalex"))]
    async fn journal_by_id(&self, id: &str) -> Result<Option<SourceJournal>, SourceError> {
        let id = short_id(id.trim());
        if id.is_empty() {
            return Ok(None);
        }
        let url = self.build_url(&format!("sources/{}", urlencoding::encode(id)), &[]);
        match self.fetch::<OaSource>("sources/{id}", &url).await {
            Ok(source) => Ok(convert_source(source)),
            Err(SourceError::HttpStatus { status: 404, .. }) => {
                debug!(journal_id = id, "Journal not found in OpenAlex");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}

// ==================== Conversion Helpers ====================

fn per_page(limit: usize) -> String {
    limit.clamp(1, MAX_PER_PAGE).to_string()
}

/// Strips the `https://openalex.org/` prefix from an entity id.
fn short_id(id: &str) -> &str {
    id.strip_prefix(OPENALEX_ID_PREFIX).unwrap_or(id)
}

/// Parses the numeric tail of a taxon URL such as
/// `https://openalex.org/subfields/1707`.
fn taxon_id(id: &str) -> Option<u32> {
    id.rsplit('/').next().and_then(|tail| tail.parse().ok())
}

fn convert_taxon(taxon: Option<&OaTaxon>) -> Option<TaxonRef> {
    let taxon = taxon?;
    Some(TaxonRef {
        id: taxon_id(&taxon.id)?,
        name: taxon.display_name.clone(),
    })
}

fn convert_work(work: OaWork) -> Work {
    let primary = work.primary_topic.as_ref();
    let mut topic_ids: Vec<String> = Vec::new();
    for topic in primary.into_iter().chain(work.topics.iter().flatten()) {
        let id = short_id(&topic.id).to_string();
        if !topic_ids.contains(&id) {
            topic_ids.push(id);
        }
    }

    Work {
        id: short_id(&work.id).to_string(),
        title: work.display_name.clone().unwrap_or_default(),
        cited_by_count: work.cited_by_count.unwrap_or(0),
        subfield: convert_taxon(primary.and_then(|t| t.subfield.as_ref())),
        field: convert_taxon(primary.and_then(|t| t.field.as_ref())),
        topic_ids,
    }
}

fn convert_source(source: OaSource) -> Option<SourceJournal> {
    let name = source
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())?;
    let stats = source.summary_stats.as_ref();

    let topics = source
        .topics
        .unwrap_or_default()
        .into_iter()
        .map(|topic| JournalTopic {
            id: short_id(&topic.id).to_string(),
            name: topic.display_name.unwrap_or_default(),
            subfield_id: topic.subfield.as_ref().and_then(|t| taxon_id(&t.id)),
            field_id: topic.field.as_ref().and_then(|t| taxon_id(&t.id)),
            count: topic.count.unwrap_or(0),
        })
        .collect();

    Some(SourceJournal {
        id: source
            .id
            .as_deref()
            .map(short_id)
            .unwrap_or_default()
            .to_string(),
        name,
        issn: source.issn_l,
        publisher: source.host_organization_name,
        metrics: JournalMetrics {
            h_index: stats.and_then(|s| s.h_index).unwrap_or(0),
            works_count: source.works_count.unwrap_or(0),
            two_yr_mean_citedness: stats
                .and_then(|s| s.two_yr_mean_citedness)
                .filter(|c| c.is_finite() && *c >= 0.0)
                .unwrap_or(0.0),
        },
        is_open_access: source.is_oa.unwrap_or(false),
        apc_usd: source.apc_usd,
        topics,
    })
}
