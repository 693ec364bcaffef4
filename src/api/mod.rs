use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

pub mod ops;
pub mod query;

/// Uniform JSON body for every non-2xx API response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub(crate) fn error_response(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}
