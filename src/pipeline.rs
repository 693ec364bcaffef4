use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::{CacheStats, ResponseCache};
use crate::config::Config;
use crate::error::RagError;
use crate::fusion::{reciprocal_rank_fusion, RRF_K};
use crate::llm::generate::{truncate_text, MEDICAL_DISCLAIMER};
use crate::models::{
    ContextChunk, GenerationResult, RagResponse, ResponseMetadata, ScoredPoint, SourcePreview,
};

/// Turns a text into a fixed-length embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

/// Queries one named collection for the nearest vectors.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        collection: &str,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, RagError>;
}

/// Produces a grounded answer from the question and context chunks.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        question: &str,
        context_chunks: &[ContextChunk],
    ) -> Result<GenerationResult, RagError>;
}

/// The retrieval-fusion-generation orchestrator.
///
/// Sequences embed → two concurrent collection searches → RRF fusion →
/// generation, with a cache check up front and full error-path handling.
/// [`RagPipeline::retrieve_answer`] never fails: every error kind is mapped
/// to a well-formed degraded response carrying the disclaimer and an
/// `error_type` tag. Degraded responses are never written to the cache.
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    searcher: Arc<dyn VectorSearch>,
    generator: Arc<dyn Generator>,
    cache: ResponseCache,
    internal_collection: String,
    external_collection: String,
    model: String,
    search_topk: usize,
    max_source_display: usize,
    max_source_text_length: usize,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        searcher: Arc<dyn VectorSearch>,
        generator: Arc<dyn Generator>,
        cache: ResponseCache,
        config: &Config,
    ) -> Self {
        Self {
            embedder,
            searcher,
            generator,
            cache,
            internal_collection: config.qdrant.internal_collection.clone(),
            external_collection: config.qdrant.external_collection.clone(),
            model: config.llm.chat_model.clone(),
            search_topk: config.pipeline.search_topk,
            max_source_display: config.pipeline.max_source_display,
            max_source_text_length: config.pipeline.max_source_text_length,
        }
    }

    /// Answer a question. The sole entry point for the HTTP layer and CLIs.
    pub async fn retrieve_answer(&self, question: &str, top_k: Option<usize>) -> RagResponse {
        let q = question.trim();
        if q.is_empty() {
            return self.empty_question_response();
        }

        let top_k = top_k.unwrap_or(self.search_topk).clamp(1, 100);

        let cache_key = ResponseCache::key(q, top_k, &self.model);
        if let Some(cached) = self.cache.get(&cache_key) {
            tracing::info!("Cache hit for query");
            return cached;
        }

        match self.run(q, top_k).await {
            Ok(response) => {
                // Responses carrying a generation-level error stay uncached so
                // a retry reaches the provider again.
                if response.error.is_none() {
                    self.cache.set(&cache_key, response.clone());
                }
                response
            }
            Err(e) => self.degraded_response(q, e),
        }
    }

    async fn run(&self, q: &str, top_k: usize) -> Result<RagResponse, RagError> {
        tracing::info!("RAG query: {}", truncate_text(q, 100));

        // Step 1: embed the question
        let query_vector = self.embedder.embed(q).await?;

        // Step 2: search both collections concurrently. Both must succeed;
        // fusing a half-failed pair would silently bias the ranking.
        let (internal, external) = tokio::join!(
            self.searcher
                .search(&query_vector, top_k, &self.internal_collection, None),
            self.searcher
                .search(&query_vector, top_k, &self.external_collection, None),
        );
        let internal = internal?;
        let external = external?;

        tracing::info!(
            "Retrieved: {} internal, {} external",
            internal.len(),
            external.len()
        );

        // Step 3: reciprocal-rank fusion
        let fused = reciprocal_rank_fusion(&internal, &external, RRF_K);

        if fused.is_empty() {
            tracing::warn!("No results from vector search");
            return Ok(self.no_results_response(q, internal.len(), external.len()));
        }

        // Step 4: context chunks from the top fused results
        let context_chunks: Vec<ContextChunk> = fused
            .iter()
            .take(top_k)
            .map(|f| ContextChunk {
                text: f.point.text().to_string(),
                source: f.source,
                score: f.score,
            })
            .collect();

        tracing::info!(
            "Using {} context chunks for answer generation",
            context_chunks.len()
        );

        // Step 5: generate the answer
        let generation = self.generator.generate(q, &context_chunks).await?;

        // Step 6: assemble the response
        Ok(self.assemble_response(q, &internal, &external, fused.len(), &context_chunks, generation))
    }

    fn assemble_response(
        &self,
        q: &str,
        internal: &[ScoredPoint],
        external: &[ScoredPoint],
        fused_count: usize,
        context_chunks: &[ContextChunk],
        generation: GenerationResult,
    ) -> RagResponse {
        let sources = context_chunks
            .iter()
            .take(self.max_source_display)
            .map(|chunk| SourcePreview {
                text: truncate_text(&chunk.text, self.max_source_text_length),
                source: chunk.source,
                score: round_score(chunk.score),
            })
            .collect();

        RagResponse {
            question: q.to_string(),
            answer: generation.answer,
            sources,
            metadata: ResponseMetadata {
                internal_hits: internal.len(),
                external_hits: external.len(),
                fused_results: fused_count,
                tokens_used: generation.tokens_used,
                model: generation.model,
                error_type: None,
            },
            error: generation.error,
        }
    }

    fn empty_question_response(&self) -> RagResponse {
        RagResponse {
            question: String::new(),
            answer: format!("Lütfen bir soru girin.\n\n{MEDICAL_DISCLAIMER}"),
            sources: Vec::new(),
            metadata: ResponseMetadata {
                model: self.model.clone(),
                error_type: Some("invalid_input".to_string()),
                ..Default::default()
            },
            error: Some("Question cannot be empty".to_string()),
        }
    }

    fn no_results_response(
        &self,
        q: &str,
        internal_hits: usize,
        external_hits: usize,
    ) -> RagResponse {
        RagResponse {
            question: q.to_string(),
            answer: format!(
                "Bu soruyla ilgili bilgi bulamadım. \
                 Lütfen sorunuzu farklı şekilde ifade etmeyi deneyin.\n\n{MEDICAL_DISCLAIMER}"
            ),
            sources: Vec::new(),
            metadata: ResponseMetadata {
                internal_hits,
                external_hits,
                fused_results: 0,
                tokens_used: 0,
                model: self.model.clone(),
                error_type: None,
            },
            error: None,
        }
    }

    /// Map a classified error to a user-safe canned answer. The pipeline
    /// never lets an error escape to the caller.
    fn degraded_response(&self, q: &str, error: RagError) -> RagResponse {
        let (answer, error_text) = match &error {
            RagError::Embedding(e) => {
                tracing::error!("Embedding error in RAG pipeline: {e}");
                (
                    "Sorunuzu işlerken bir hata oluştu. Lütfen tekrar deneyin.",
                    format!("Embedding error: {e}"),
                )
            }
            RagError::RetrievalUnavailable(e) => {
                tracing::error!("Vector database error in RAG pipeline: {e}");
                (
                    "Veritabanı bağlantısı kurulamadı. Lütfen daha sonra tekrar deneyin.",
                    format!("Database error: {e}"),
                )
            }
            RagError::Generation(e) => {
                tracing::error!("Generation error in RAG pipeline: {e}");
                (
                    "Cevap oluşturulurken bir hata oluştu. Lütfen tekrar deneyin.",
                    format!("Generation error: {e}"),
                )
            }
            RagError::InvalidInput(e) | RagError::InvalidCollection(e) => {
                tracing::error!("Unexpected error in RAG pipeline: {e}");
                (
                    "Beklenmeyen bir hata oluştu. Lütfen daha sonra tekrar deneyin.",
                    format!("Unexpected error: {e}"),
                )
            }
        };

        let error_type = match &error {
            RagError::InvalidInput(_) | RagError::InvalidCollection(_) => "unexpected",
            other => other.error_type(),
        };

        RagResponse {
            question: q.to_string(),
            answer: format!("{answer}\n\n{MEDICAL_DISCLAIMER}"),
            sources: Vec::new(),
            metadata: ResponseMetadata {
                model: self.model.clone(),
                error_type: Some(error_type.to_string()),
                ..Default::default()
            },
            error: Some(error_text),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn flush_cache(&self) -> usize {
        self.cache.flush()
    }

    /// Test hook: zero the cache counters.
    pub fn reset_cache_metrics(&self) {
        self.cache.reset_metrics();
    }
}

fn round_score(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}
