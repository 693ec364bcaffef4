use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::QdrantConfig;
use crate::error::RagError;
use crate::models::{CollectionInfo, ScoredPoint};
use crate::pipeline::VectorSearch;

/// Valid top-K range for a single search.
const TOPK_RANGE: std::ops::RangeInclusive<usize> = 1..=100;

/// Client for the Qdrant REST API.
///
/// Only the two configured collections are searchable; an empty result set
/// and an unreachable database are distinct, observable outcomes
/// (`Ok(vec![])` vs `RetrievalUnavailable`).
pub struct QdrantClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    internal_collection: String,
    external_collection: String,
}

impl QdrantClient {
    pub fn new(http: reqwest::Client, config: &QdrantConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            internal_collection: config.internal_collection.clone(),
            external_collection: config.external_collection.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    /// Names of all collections on the server.
    pub async fn list_collections(&self) -> Result<Vec<String>, RagError> {
        let resp = self
            .request(reqwest::Method::GET, "/collections")
            .send()
            .await
            .map_err(|e| RagError::RetrievalUnavailable(format!("list collections failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(RagError::RetrievalUnavailable(format!(
                "list collections returned {status}"
            )));
        }

        let body: ApiResponse<CollectionsResult> = resp.json().await.map_err(|e| {
            RagError::RetrievalUnavailable(format!("invalid collections response: {e}"))
        })?;

        Ok(body
            .result
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Point count, vector size and status of one collection.
    pub async fn get_collection(&self, name: &str) -> Result<CollectionInfo, RagError> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/collections/{name}"))
            .send()
            .await
            .map_err(|e| RagError::RetrievalUnavailable(format!("get collection failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(RagError::RetrievalUnavailable(format!(
                "collection '{name}' returned {status}"
            )));
        }

        let body: ApiResponse<CollectionResult> = resp.json().await.map_err(|e| {
            RagError::RetrievalUnavailable(format!("invalid collection response: {e}"))
        })?;

        let result = body.result;
        Ok(CollectionInfo {
            name: name.to_string(),
            points_count: result.points_count.unwrap_or(0),
            vector_size: result
                .config
                .as_ref()
                .and_then(|c| c.params.vectors.as_ref())
                .map(|v| v.size)
                .unwrap_or(0),
            status: result.status,
        })
    }

    fn validate_collection(&self, collection: &str) -> Result<(), RagError> {
        if collection != self.internal_collection && collection != self.external_collection {
            return Err(RagError::InvalidCollection(format!(
                "'{collection}' is not one of '{}' or '{}'",
                self.internal_collection, self.external_collection
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorSearch for QdrantClient {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        collection: &str,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, RagError> {
        self.validate_collection(collection)?;
        if !TOPK_RANGE.contains(&top_k) {
            return Err(RagError::InvalidInput(format!(
                "top_k must be between 1 and 100, got {top_k}"
            )));
        }

        let req = SearchRequest {
            vector: vector.to_vec(),
            limit: top_k,
            score_threshold,
            with_payload: true,
        };

        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{collection}/points/search"),
            )
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                RagError::RetrievalUnavailable(format!("search in {collection} failed: {e}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RagError::RetrievalUnavailable(format!(
                "search in {collection} returned {status}: {body}"
            )));
        }

        let body: ApiResponse<Vec<SearchResult>> = resp.json().await.map_err(|e| {
            RagError::RetrievalUnavailable(format!("invalid search response: {e}"))
        })?;

        tracing::debug!(
            "Search completed: {} results from {collection} (requested: {top_k})",
            body.result.len()
        );

        Ok(body
            .result
            .into_iter()
            .map(|r| ScoredPoint {
                id: r.id.into_string(),
                score: r.score,
                payload: r.payload.unwrap_or_default(),
            })
            .collect())
    }
}

#[derive(Serialize)]
struct SearchRequest {
    vector: Vec<f32>,
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    score_threshold: Option<f32>,
    with_payload: bool,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionName>,
}

#[derive(Deserialize)]
struct CollectionName {
    name: String,
}

#[derive(Deserialize)]
struct CollectionResult {
    status: String,
    points_count: Option<u64>,
    config: Option<CollectionConfig>,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: Option<VectorParams>,
}

#[derive(Deserialize)]
struct VectorParams {
    size: u64,
}

/// Qdrant point ids are either unsigned integers or UUID strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum PointId {
    Num(u64),
    Str(String),
}

impl PointId {
    fn into_string(self) -> String {
        match self {
            PointId::Num(n) => n.to_string(),
            PointId::Str(s) => s,
        }
    }
}

#[derive(Deserialize)]
struct SearchResult {
    id: PointId,
    score: f32,
    payload: Option<HashMap<String, serde_json::Value>>,
}
