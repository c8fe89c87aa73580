// Hosted search index: the SearchIndex contract and its Algolia REST implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Settings;
use crate::error::{BackendError, BackendResult};
use crate::filters::FilterState;
use crate::normalize::RawRecord;
use crate::query::{IndexFilters, build_index_filters};

const BACKEND: &str = "algolia";

#[derive(Debug, Clone, PartialEq)]
pub struct IndexRequest {
    pub query: String,
    pub filters: IndexFilters,
    /// Zero-based, as the index counts pages.
    pub page: u32,
    pub hits_per_page: u32,
}

impl IndexRequest {
    pub fn from_filter_state(state: &FilterState) -> Self {
        IndexRequest {
            query: state.query.clone().unwrap_or_default(),
            filters: build_index_filters(state),
            page: state.page.saturating_sub(1),
            hits_per_page: state.limit,
        }
    }

    fn to_body(&self) -> Value {
        let mut body = json!({
            "query": self.query,
            "page": self.page,
            "hitsPerPage": self.hits_per_page,
        });
        if !self.filters.filters.is_empty() {
            body["filters"] = json!(self.filters.filters);
        }
        if !self.filters.numeric_filters.is_empty() {
            body["numericFilters"] = json!(self.filters.numeric_filters);
        }
        body
    }
}

#[derive(Debug, Clone)]
pub struct IndexResponse {
    pub hits: Vec<RawRecord>,
    /// Total matches reported by the index; may exceed `hits.len()`.
    pub total_hits: u64,
    pub processing_time_ms: u64,
}

/// Fast full-text/faceted search service, consulted as an opaque black box.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    fn is_available(&self) -> bool;

    async fn search(&self, request: &IndexRequest) -> BackendResult<IndexResponse>;
}

#[derive(Debug, Clone)]
struct AlgoliaCredentials {
    app_id: String,
    api_key: String,
    index: String,
}

pub struct AlgoliaClient {
    http: Client,
    credentials: Option<AlgoliaCredentials>,
}

impl AlgoliaClient {
    pub fn new(settings: &Settings, http: Client) -> Self {
        let credentials = settings
            .algolia_credentials()
            .map(|(app_id, api_key, index)| AlgoliaCredentials {
                app_id: app_id.to_string(),
                api_key: api_key.to_string(),
                index: index.to_string(),
            });
        if credentials.is_none() {
            tracing::info!("Algolia is not configured, searches will use Firestore only");
        }
        AlgoliaClient { http, credentials }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    hits: Vec<Value>,
    #[serde(default)]
    nb_hits: u64,
    #[serde(default, rename = "processingTimeMS")]
    processing_time_ms: u64,
}

impl From<QueryResponse> for IndexResponse {
    fn from(response: QueryResponse) -> Self {
        IndexResponse {
            hits: response.hits.into_iter().map(RawRecord::from_index_hit).collect(),
            total_hits: response.nb_hits,
            processing_time_ms: response.processing_time_ms,
        }
    }
}

#[async_trait]
impl SearchIndex for AlgoliaClient {
    fn is_available(&self) -> bool {
        self.credentials.is_some()
    }

    async fn search(&self, request: &IndexRequest) -> BackendResult<IndexResponse> {
        let creds = self.credentials.as_ref().ok_or(BackendError::IndexUnavailable)?;
        let url = format!(
            "https://{}-dsn.algolia.net/1/indexes/{}/query",
            creds.app_id, creds.index
        );
        let body = request.to_body();
        tracing::debug!(body = %body, "Querying Algolia");

        let response = self
            .http
            .post(&url)
            .header("X-Algolia-Application-Id", &creds.app_id)
            .header("X-Algolia-API-Key", &creds.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status { backend: BACKEND, status });
        }

        let parsed: QueryResponse = response.json().await.map_err(|e| BackendError::Malformed {
            backend: BACKEND,
            message: e.to_string(),
        })?;
        Ok(parsed.into())
    }
}
