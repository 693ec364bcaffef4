use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::{error_response, ErrorBody};
use crate::models::{QueryRequest, RagResponse};
use crate::state::AppState;

/// Question length bounds after trimming.
const MIN_QUESTION_CHARS: usize = 3;
const MAX_QUESTION_CHARS: usize = 500;

/// POST /api/rag/query - answer a question over the two medical collections.
///
/// Validation failures are HTTP 400 with an `{"error": ...}` body; everything
/// past validation is delegated to the pipeline, which always returns a
/// well-formed response (degraded responses carry `error` /
/// `metadata.error_type` instead of failing).
pub async fn query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<RagResponse>, (StatusCode, Json<ErrorBody>)> {
    let q = req.q.trim().to_string();
    let char_count = q.chars().count();
    if !(MIN_QUESTION_CHARS..=MAX_QUESTION_CHARS).contains(&char_count) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!(
                "Question must be {MIN_QUESTION_CHARS}-{MAX_QUESTION_CHARS} characters, got {char_count}"
            ),
        ));
    }

    if let Some(top_k) = req.top_k {
        if !(1..=100).contains(&top_k) {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                format!("top_k must be between 1 and 100, got {top_k}"),
            ));
        }
    }

    let response = state.pipeline.retrieve_answer(&q, req.top_k).await;
    Ok(Json(response))
}
