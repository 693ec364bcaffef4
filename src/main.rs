use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use hekim_rag::api;
use hekim_rag::config::Config;
use hekim_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    config.validate()?;
    tracing::info!("Environment: {}", config.env);
    tracing::info!(
        "Qdrant: {} (collections: {}, {})",
        config.qdrant.base_url,
        config.qdrant.internal_collection,
        config.qdrant.external_collection
    );
    tracing::info!(
        "LLM: {} / embeddings: {}",
        config.llm.chat_model,
        config.llm.embedding_model
    );

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/health", get(api::ops::health))
        .route("/ready", get(api::ops::ready))
        .route("/api/rag/query", post(api::query::query))
        .route("/api/cache/stats", get(api::ops::cache_stats))
        .route("/api/cache/flush", post(api::ops::flush_cache))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
