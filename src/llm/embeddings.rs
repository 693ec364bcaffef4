use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::RagError;
use crate::pipeline::Embedder;

/// Maximum characters submitted per text. The OpenAI embedding models take
/// ~8k tokens; longer inputs are lossy-embedded rather than rejected.
const MAX_EMBED_CHARS: usize = 8_000;

/// OpenAI batch limit on inputs per embeddings call.
const MAX_BATCH_SIZE: usize = 2_048;

/// Embedding client for the OpenAI `/v1/embeddings` API.
pub struct EmbeddingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl EmbeddingClient {
    pub fn new(http: reqwest::Client, config: &LlmConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
            model: config.embedding_model.clone(),
        }
    }

    /// Vector length produced by the configured model.
    pub fn dimension(&self) -> usize {
        // text-embedding-3-small = 1536 dims, text-embedding-3-large = 3072
        if self.model.to_lowercase().contains("large") {
            3072
        } else {
            1536
        }
    }

    /// Embed a batch of texts. Empty strings are filtered out; the remaining
    /// outputs preserve input order. Issues multiple provider calls when the
    /// input count exceeds `batch_size`.
    pub async fn embed_batch(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Err(RagError::InvalidInput(
                "cannot embed an empty list of texts".to_string(),
            ));
        }
        if batch_size < 1 || batch_size > MAX_BATCH_SIZE {
            return Err(RagError::InvalidInput(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}"
            )));
        }

        let original_count = texts.len();
        let filtered: Vec<&str> = texts
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if filtered.len() < original_count {
            tracing::warn!(
                "Filtered out {} empty texts before embedding",
                original_count - filtered.len()
            );
        }
        if filtered.is_empty() {
            return Err(RagError::InvalidInput(
                "all texts are empty after filtering".to_string(),
            ));
        }

        let mut all_embeddings = Vec::with_capacity(filtered.len());
        for chunk in filtered.chunks(batch_size) {
            let inputs: Vec<String> = chunk
                .iter()
                .map(|t| truncate_for_embedding(t).to_string())
                .collect();
            let mut embeddings = self.call_provider(inputs).await?;
            all_embeddings.append(&mut embeddings);
        }

        Ok(all_embeddings)
    }

    async fn call_provider(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, RagError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let req = EmbedRequest {
            model: self.model.clone(),
            input,
            encoding_format: "float",
        };

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("embeddings request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "embeddings API returned {status}: {body}"
            )));
        }

        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("invalid embeddings response: {e}")))?;

        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait::async_trait]
impl Embedder for EmbeddingClient {
    /// Embed a single text. Fails with `InvalidInput` if the text is empty
    /// after trimming; no retry at this layer.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RagError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        let char_count = text.chars().count();
        if char_count > MAX_EMBED_CHARS {
            tracing::warn!("Text too long ({char_count} chars), truncating to {MAX_EMBED_CHARS}");
        }

        let embeddings = self
            .call_provider(vec![truncate_for_embedding(text).to_string()])
            .await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("no embedding returned".to_string()))
    }
}

/// Truncate `text` to at most `MAX_EMBED_CHARS` characters. The limit is in
/// characters, not bytes: Turkish input is multibyte and must keep its full
/// character budget.
fn truncate_for_embedding(text: &str) -> &str {
    match text.char_indices().nth(MAX_EMBED_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}
