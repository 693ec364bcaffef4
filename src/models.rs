use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single hit from one vector collection.
///
/// Scores are on the provider's own similarity scale and are not comparable
/// across collections; only the list order is trusted downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    /// Free-form payload. Carries at least a "text" field plus optional
    /// nested metadata.
    pub payload: HashMap<String, serde_json::Value>,
}

impl ScoredPoint {
    /// The chunk text stored in the payload, or empty if absent.
    pub fn text(&self) -> &str {
        self.payload
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }
}

/// Which ranking(s) a fused result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Internal,
    External,
    Both,
}

/// One entry of the fused ranking. Exactly one exists per unique point id
/// seen in either input list.
#[derive(Debug, Clone)]
pub struct FusedResult {
    pub point: ScoredPoint,
    /// RRF score, comparable across the two source collections.
    pub score: f64,
    pub source: Provenance,
}

/// A fused result prepared for answer generation.
#[derive(Debug, Clone)]
pub struct ContextChunk {
    pub text: String,
    pub source: Provenance,
    pub score: f64,
}

/// Output of the answer generator.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Always contains the medical disclaimer verbatim.
    pub answer: String,
    pub tokens_used: u32,
    pub model: String,
    /// Provider failure after exhausting retries. Recoverable at pipeline
    /// level: the response is still returned, just tagged.
    pub error: Option<String>,
}

/// Truncated source preview included in a [`RagResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePreview {
    pub text: String,
    pub source: Provenance,
    /// Fused score rounded to 4 decimal places.
    pub score: f64,
}

/// Pipeline statistics attached to every response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub internal_hits: usize,
    pub external_hits: usize,
    pub fused_results: usize,
    pub tokens_used: u32,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

/// The unit returned to callers and persisted in the response cache.
///
/// Always well-formed: every failure mode still yields an answer string
/// containing the disclaimer, with `error` distinguishing degraded responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourcePreview>,
    pub metadata: ResponseMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `POST /api/rag/query`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub q: String,
    pub top_k: Option<usize>,
}

/// Summary of one Qdrant collection, surfaced by the readiness check.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub points_count: u64,
    pub vector_size: u64,
    pub status: String,
}
