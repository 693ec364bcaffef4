use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::llm::embeddings::EmbeddingClient;
use crate::llm::generate::GenerationClient;
use crate::pipeline::RagPipeline;
use crate::qdrant::QdrantClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<RagPipeline>,
    pub qdrant: Arc<QdrantClient>,
}

impl AppState {
    /// Wire up the provider clients and the pipeline. Clients are constructed
    /// here and injected; nothing is a global singleton.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let qdrant_http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.qdrant.timeout_secs))
            .build()?;
        let llm_http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.llm.timeout_secs))
            .build()?;

        let embedder = Arc::new(EmbeddingClient::new(llm_http.clone(), &config.llm));
        let generator = Arc::new(GenerationClient::new(
            llm_http,
            &config.llm,
            config.pipeline.max_context_chunks,
        ));
        let qdrant = Arc::new(QdrantClient::new(qdrant_http, &config.qdrant));

        let cache = ResponseCache::new(
            config.cache.enabled,
            Duration::from_secs(config.cache.ttl_secs),
            config.cache.max_entries,
        );

        let pipeline = Arc::new(RagPipeline::new(
            embedder,
            qdrant.clone(),
            generator,
            cache,
            &config,
        ));

        Ok(Self {
            config,
            pipeline,
            qdrant,
        })
    }
}
