use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// "staging", "production" or "development"
    pub env: String,
    /// Server bind address
    pub bind_addr: String,
    /// Qdrant vector database configuration
    pub qdrant: QdrantConfig,
    /// OpenAI provider configuration (embeddings + generation)
    pub llm: LlmConfig,
    /// Retrieval and response-shaping knobs
    pub pipeline: PipelineConfig,
    /// Response cache configuration
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    /// Base URL for the Qdrant REST API (e.g. "http://localhost:6333")
    pub base_url: String,
    /// API key sent in the `api-key` header (required in production)
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Internal knowledge-base collection name
    pub internal_collection: String,
    /// External medical knowledge collection name
    pub external_collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the OpenAI-compatible API
    pub base_url: String,
    /// API key (required)
    pub api_key: Option<String>,
    /// Embedding model (1536 dims for -small, 3072 for -large)
    pub embedding_model: String,
    /// Chat model for answer generation
    pub chat_model: String,
    /// Sampling temperature (0-2)
    pub temperature: f32,
    /// Max tokens for the generated answer
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Top-K results to retrieve per collection (1-100)
    pub search_topk: usize,
    /// Max context chunks fed to the LLM
    pub max_context_chunks: usize,
    /// Max sources included in the response
    pub max_source_display: usize,
    /// Max characters per source preview
    pub max_source_text_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
    /// Maximum number of cached responses
    pub max_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: "staging".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            qdrant: QdrantConfig::default(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:6333".to_string(),
            api_key: None,
            timeout_secs: 10,
            internal_collection: "hekim_internal".to_string(),
            external_collection: "hekim_external".to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4o".to_string(),
            temperature: 0.3,
            max_tokens: 800,
            timeout_secs: 30,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_topk: 5,
            max_context_chunks: 5,
            max_source_display: 3,
            max_source_text_length: 200,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
            max_entries: 128,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(env) = std::env::var("HEKIM_ENV") {
            config.env = env;
        }
        if let Ok(addr) = std::env::var("HEKIM_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(url) = std::env::var("QDRANT_URL") {
            config.qdrant.base_url = url;
        }
        if let Ok(key) = std::env::var("QDRANT_API_KEY") {
            config.qdrant.api_key = Some(key);
        }
        if let Ok(val) = std::env::var("QDRANT_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.qdrant.timeout_secs = v;
            }
        }
        if let Ok(name) = std::env::var("QDRANT_INTERNAL_COLLECTION") {
            config.qdrant.internal_collection = name;
        }
        if let Ok(name) = std::env::var("QDRANT_EXTERNAL_COLLECTION") {
            config.qdrant.external_collection = name;
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("OPENAI_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(val) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(v) = val.parse::<f32>() {
                config.llm.temperature = v.clamp(0.0, 2.0);
            }
        }
        if let Ok(val) = std::env::var("LLM_MAX_TOKENS") {
            if let Ok(v) = val.parse() {
                config.llm.max_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("LLM_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.llm.timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("SEARCH_TOPK") {
            if let Ok(v) = val.parse::<usize>() {
                config.pipeline.search_topk = v.clamp(1, 100);
            }
        }
        if let Ok(val) = std::env::var("PIPELINE_MAX_CONTEXT_CHUNKS") {
            if let Ok(v) = val.parse::<usize>() {
                config.pipeline.max_context_chunks = v.clamp(1, 20);
            }
        }
        if let Ok(val) = std::env::var("PIPELINE_MAX_SOURCE_DISPLAY") {
            if let Ok(v) = val.parse::<usize>() {
                config.pipeline.max_source_display = v.clamp(1, 10);
            }
        }
        if let Ok(val) = std::env::var("PIPELINE_MAX_SOURCE_TEXT_LENGTH") {
            if let Ok(v) = val.parse::<usize>() {
                config.pipeline.max_source_text_length = v.clamp(50, 2000);
            }
        }
        if let Ok(val) = std::env::var("CACHE_ENABLED") {
            config.cache.enabled = val != "0" && !val.eq_ignore_ascii_case("false");
        }
        if let Ok(val) = std::env::var("CACHE_TTL_SECS") {
            if let Ok(v) = val.parse() {
                config.cache.ttl_secs = v;
            }
        }
        if let Ok(val) = std::env::var("CACHE_MAX_ENTRIES") {
            if let Ok(v) = val.parse() {
                config.cache.max_entries = v;
            }
        }

        config
    }

    /// Startup validation of required secrets.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.api_key.as_deref().unwrap_or("").is_empty() {
            anyhow::bail!("OPENAI_API_KEY is required");
        }
        if self.env == "production" && self.qdrant.api_key.is_none() {
            anyhow::bail!("QDRANT_API_KEY is required in production");
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}
