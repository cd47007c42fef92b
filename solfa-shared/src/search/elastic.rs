/// Elasticsearch REST client
///
/// Uses three endpoints:
///
/// - `PUT /{index}/_doc/{id}` or `POST /{index}/_doc` to index
/// - `POST /{index}/_search` to query
/// - `POST /{index}/_update/{id}` with `{"doc": ...}` to patch

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use super::{SearchError, SearchHit, SearchIndex, SearchQuery};

/// Connection settings
#[derive(Debug, Clone, Default)]
pub struct ElasticsearchConfig {
    /// Base URL, e.g. `https://localhost:9200`
    pub host: String,
    pub username: Option<String>,
    pub password: Option<String>,

    /// Skip TLS certificate verification (self-signed dev clusters)
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone)]
pub struct ElasticsearchIndex {
    client: Client,
    base: Url,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: JsonValue,
}

impl ElasticsearchIndex {
    pub fn new(config: ElasticsearchConfig) -> Result<Self, SearchError> {
        let base = Url::parse(config.host.trim())
            .map_err(|e| SearchError::InvalidConfig(format!("invalid ES_HOST: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(SearchError::InvalidConfig(format!(
                "ES_HOST is not a base URL: {}",
                config.host
            )));
        }

        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for Elasticsearch");
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base,
            username: config.username.filter(|u| !u.is_empty()),
            password: config.password,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SearchError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SearchError::InvalidConfig("ES_HOST is not a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_deref()),
            None => request,
        }
    }
}

async fn rejected(response: Response) -> SearchError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    SearchError::Rejected { status, body }
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        document: &JsonValue,
    ) -> Result<String, SearchError> {
        let request = match id {
            Some(id) => self.client.put(self.url(&[index, "_doc", id])?),
            None => self.client.post(self.url(&[index, "_doc"])?),
        };

        let response = self.authorize(request).json(document).send().await?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        let indexed: IndexResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        debug!(index, id = %indexed.id, "Indexed document");
        Ok(indexed.id)
    }

    async fn search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let request = self.client.post(self.url(&[index, "_search"])?);
        let response = self.authorize(request).json(&query.to_body()).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(index, "Search on missing index");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| SearchHit {
                id: hit.id,
                score: hit.score,
                source: hit.source,
            })
            .collect())
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &JsonValue,
    ) -> Result<(), SearchError> {
        let request = self.client.post(self.url(&[index, "_update", id])?);
        let response = self
            .authorize(request)
            .json(&json!({ "doc": partial }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SearchError::NotFound(id.to_string()));
        }
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        debug!(index, id, "Updated document");
        Ok(())
    }
}
