use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::{error_response, ErrorBody};
use crate::cache::CacheStats;
use crate::models::CollectionInfo;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub env: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub collections: Vec<CollectionInfo>,
}

#[derive(Serialize)]
pub struct FlushResponse {
    pub flushed: usize,
}

/// GET /health - liveness probe, no dependency checks.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        env: state.config.env.clone(),
    })
}

/// GET /ready - verifies both vector collections exist and are reachable.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ErrorBody>)> {
    let names = [
        state.config.qdrant.internal_collection.clone(),
        state.config.qdrant.external_collection.clone(),
    ];

    let available = state.qdrant.list_collections().await.map_err(|e| {
        tracing::warn!("Readiness check failed: {e}");
        error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("vector database unavailable: {e}"),
        )
    })?;

    let mut collections = Vec::with_capacity(names.len());
    for name in &names {
        if !available.iter().any(|c| c == name) {
            tracing::warn!("Readiness check failed: collection '{name}' missing");
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("collection '{name}' does not exist"),
            ));
        }
        match state.qdrant.get_collection(name).await {
            Ok(info) => collections.push(info),
            Err(e) => {
                tracing::warn!("Readiness check failed for '{name}': {e}");
                return Err(error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    format!("collection '{name}' unavailable: {e}"),
                ));
            }
        }
    }

    Ok(Json(ReadinessResponse {
        ready: true,
        collections,
    }))
}

/// GET /api/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.pipeline.cache_stats())
}

/// POST /api/cache/flush
pub async fn flush_cache(State(state): State<AppState>) -> Json<FlushResponse> {
    let flushed = state.pipeline.flush_cache();
    tracing::info!("Cache flushed: {flushed} entries removed");
    Json(FlushResponse { flushed })
}
