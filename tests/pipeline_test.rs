//! End-to-end pipeline tests with mock providers.
//!
//! These exercise the full retrieve-fuse-generate flow, the cache policy and
//! every degraded path without a running Qdrant or OpenAI endpoint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use hekim_rag::cache::ResponseCache;
use hekim_rag::config::Config;
use hekim_rag::error::RagError;
use hekim_rag::llm::generate::MEDICAL_DISCLAIMER;
use hekim_rag::models::{ContextChunk, GenerationResult, Provenance, ScoredPoint};
use hekim_rag::pipeline::{Embedder, Generator, RagPipeline, VectorSearch};

fn make_point(id: &str, score: f32, text: &str) -> ScoredPoint {
    let mut payload = HashMap::new();
    payload.insert(
        "text".to_string(),
        serde_json::Value::String(text.to_string()),
    );
    ScoredPoint {
        id: id.to_string(),
        score,
        payload,
    }
}

#[derive(Default)]
struct MockEmbedder {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::Embedding("provider returned 429".to_string()));
        }
        Ok(vec![0.1; 1536])
    }
}

#[derive(Default)]
struct MockSearcher {
    calls: AtomicUsize,
    internal: Vec<ScoredPoint>,
    external: Vec<ScoredPoint>,
    unavailable: bool,
}

#[async_trait]
impl VectorSearch for MockSearcher {
    async fn search(
        &self,
        _vector: &[f32],
        _top_k: usize,
        collection: &str,
        _score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(RagError::RetrievalUnavailable(
                "connection refused".to_string(),
            ));
        }
        match collection {
            "hekim_internal" => Ok(self.internal.clone()),
            "hekim_external" => Ok(self.external.clone()),
            other => Err(RagError::InvalidCollection(other.to_string())),
        }
    }
}

#[derive(Default)]
struct MockGenerator {
    calls: AtomicUsize,
    error: Option<String>,
    fatal: bool,
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(
        &self,
        _question: &str,
        context_chunks: &[ContextChunk],
    ) -> Result<GenerationResult, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fatal {
            return Err(RagError::Generation("chat response had no choices".to_string()));
        }
        assert!(
            !context_chunks.is_empty(),
            "pipeline must not invoke the generator without context"
        );
        Ok(GenerationResult {
            answer: format!("Belirtiler şunlardır [Kaynak 1].\n\n{MEDICAL_DISCLAIMER}"),
            tokens_used: 42,
            model: "gpt-4o".to_string(),
            error: self.error.clone(),
        })
    }
}

struct Harness {
    embedder: Arc<MockEmbedder>,
    searcher: Arc<MockSearcher>,
    generator: Arc<MockGenerator>,
    pipeline: RagPipeline,
}

fn make_harness(
    embedder: MockEmbedder,
    searcher: MockSearcher,
    generator: MockGenerator,
) -> Harness {
    let embedder = Arc::new(embedder);
    let searcher = Arc::new(searcher);
    let generator = Arc::new(generator);

    let config = Config::default();
    let cache = ResponseCache::new(
        true,
        Duration::from_secs(60),
        config.cache.max_entries,
    );
    let pipeline = RagPipeline::new(
        embedder.clone(),
        searcher.clone(),
        generator.clone(),
        cache,
        &config,
    );

    Harness {
        embedder,
        searcher,
        generator,
        pipeline,
    }
}

fn overlap_searcher() -> MockSearcher {
    MockSearcher {
        internal: vec![
            make_point("doc1", 0.91, "Diyabetin yaygın belirtileri"),
            make_point("doc2", 0.84, "Kan şekeri düzeyleri"),
        ],
        external: vec![make_point("doc1", 14.2, "Diyabetin yaygın belirtileri")],
        ..Default::default()
    }
}

#[tokio::test]
async fn scenario_a_overlapping_point_ranks_first_as_both() {
    let h = make_harness(
        MockEmbedder::default(),
        overlap_searcher(),
        MockGenerator::default(),
    );

    let response = h
        .pipeline
        .retrieve_answer("Diyabet belirtileri nelerdir?", None)
        .await;

    assert!(response.error.is_none());
    assert_eq!(response.metadata.internal_hits, 2);
    assert_eq!(response.metadata.external_hits, 1);
    assert_eq!(response.metadata.fused_results, 2);
    assert_eq!(response.metadata.tokens_used, 42);
    assert_eq!(response.metadata.model, "gpt-4o");

    // The overlapping point leads with provenance "both"
    assert_eq!(response.sources[0].source, Provenance::Both);
    // Rank 1 in each list: 1/(60+1) + 1/(60+1), rounded to 4 decimals
    assert_eq!(response.sources[0].score, 0.0328);
    assert!(response.answer.contains(MEDICAL_DISCLAIMER));
    assert_eq!(h.searcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn scenario_b_empty_question_short_circuits_before_providers() {
    let h = make_harness(
        MockEmbedder::default(),
        overlap_searcher(),
        MockGenerator::default(),
    );

    let response = h.pipeline.retrieve_answer("   \n  ", None).await;

    assert!(response.answer.contains("Lütfen bir soru girin"));
    assert!(response.answer.contains(MEDICAL_DISCLAIMER));
    assert!(response.error.is_some());
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.searcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn scenario_c_database_unreachable_is_tagged_and_not_cached() {
    let h = make_harness(
        MockEmbedder::default(),
        MockSearcher {
            unavailable: true,
            ..Default::default()
        },
        MockGenerator::default(),
    );

    let response = h
        .pipeline
        .retrieve_answer("Diyabet belirtileri nelerdir?", None)
        .await;

    assert_eq!(response.metadata.error_type.as_deref(), Some("database"));
    assert!(response.answer.contains(MEDICAL_DISCLAIMER));
    assert!(response.error.is_some());

    // A retry repeats the provider calls instead of hitting the cache
    h.pipeline
        .retrieve_answer("Diyabet belirtileri nelerdir?", None)
        .await;
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cache_hit_skips_all_providers() {
    let h = make_harness(
        MockEmbedder::default(),
        overlap_searcher(),
        MockGenerator::default(),
    );

    let first = h
        .pipeline
        .retrieve_answer("Diyabet belirtileri nelerdir?", None)
        .await;
    let second = h
        .pipeline
        .retrieve_answer("Diyabet belirtileri nelerdir?", None)
        .await;

    assert_eq!(first.answer, second.answer);
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.searcher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.pipeline.cache_stats().metrics.hit, 1);
}

#[tokio::test]
async fn different_top_k_is_a_different_cache_key() {
    let h = make_harness(
        MockEmbedder::default(),
        overlap_searcher(),
        MockGenerator::default(),
    );

    h.pipeline.retrieve_answer("Diyabet nedir?", Some(5)).await;
    h.pipeline.retrieve_answer("Diyabet nedir?", Some(7)).await;

    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_search_results_return_no_info_without_generation() {
    let h = make_harness(
        MockEmbedder::default(),
        MockSearcher::default(),
        MockGenerator::default(),
    );

    let response = h.pipeline.retrieve_answer("Bilinmeyen konu", None).await;

    assert!(response.answer.contains("bilgi bulamadım"));
    assert!(response.answer.contains(MEDICAL_DISCLAIMER));
    assert!(response.error.is_none());
    assert_eq!(response.metadata.fused_results, 0);
    assert_eq!(response.metadata.internal_hits, 0);
    assert_eq!(response.metadata.tokens_used, 0);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);

    // Normal empty-result path is cacheable
    h.pipeline.retrieve_answer("Bilinmeyen konu", None).await;
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn embedding_failure_is_tagged_and_not_cached() {
    let h = make_harness(
        MockEmbedder {
            fail: true,
            ..Default::default()
        },
        overlap_searcher(),
        MockGenerator::default(),
    );

    let response = h.pipeline.retrieve_answer("Diyabet nedir?", None).await;

    assert_eq!(response.metadata.error_type.as_deref(), Some("embedding"));
    assert!(response.answer.contains(MEDICAL_DISCLAIMER));
    assert_eq!(h.searcher.calls.load(Ordering::SeqCst), 0);

    h.pipeline.retrieve_answer("Diyabet nedir?", None).await;
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn generation_provider_error_propagates_but_response_is_not_cached() {
    let h = make_harness(
        MockEmbedder::default(),
        overlap_searcher(),
        MockGenerator {
            error: Some("Provider error: chat API returned 503".to_string()),
            ..Default::default()
        },
    );

    let response = h.pipeline.retrieve_answer("Diyabet nedir?", None).await;

    // Generation-level error is carried in the top-level error field without
    // failing the response
    assert!(response.error.is_some());
    assert!(response.answer.contains(MEDICAL_DISCLAIMER));
    assert_eq!(response.metadata.internal_hits, 2);

    h.pipeline.retrieve_answer("Diyabet nedir?", None).await;
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fatal_generation_failure_maps_to_rag_error_type() {
    let h = make_harness(
        MockEmbedder::default(),
        overlap_searcher(),
        MockGenerator {
            fatal: true,
            ..Default::default()
        },
    );

    let response = h.pipeline.retrieve_answer("Diyabet nedir?", None).await;

    assert_eq!(response.metadata.error_type.as_deref(), Some("rag"));
    assert!(response.answer.contains(MEDICAL_DISCLAIMER));
    assert!(response.error.is_some());
}

#[tokio::test]
async fn disclaimer_present_in_every_response_shape() {
    // Success
    let h = make_harness(
        MockEmbedder::default(),
        overlap_searcher(),
        MockGenerator::default(),
    );
    let ok = h.pipeline.retrieve_answer("Diyabet nedir?", None).await;
    assert!(ok.answer.contains(MEDICAL_DISCLAIMER));

    // Empty question
    let empty = h.pipeline.retrieve_answer("", None).await;
    assert!(empty.answer.contains(MEDICAL_DISCLAIMER));

    // Database failure
    let h = make_harness(
        MockEmbedder::default(),
        MockSearcher {
            unavailable: true,
            ..Default::default()
        },
        MockGenerator::default(),
    );
    let down = h.pipeline.retrieve_answer("Diyabet nedir?", None).await;
    assert!(down.answer.contains(MEDICAL_DISCLAIMER));
}

#[tokio::test]
async fn flush_cache_empties_and_reports_count() {
    let h = make_harness(
        MockEmbedder::default(),
        overlap_searcher(),
        MockGenerator::default(),
    );

    h.pipeline.retrieve_answer("Diyabet nedir?", None).await;
    assert_eq!(h.pipeline.cache_stats().size, 1);

    assert_eq!(h.pipeline.flush_cache(), 1);
    assert_eq!(h.pipeline.cache_stats().size, 0);

    // Next call regenerates
    h.pipeline.retrieve_answer("Diyabet nedir?", None).await;
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 2);
}
