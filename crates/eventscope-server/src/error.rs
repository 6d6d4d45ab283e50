use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use eventscope_core::AnalyticsError;

/// Maximum number of events accepted in one `POST /api/events` body.
pub const MAX_BATCH: usize = 50;

/// Application-level errors that map directly to HTTP responses.
///
/// Every variant implements [`IntoResponse`] so Axum handlers can use
/// `Result<impl IntoResponse, AppError>` as their return type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("batch too large: {0} events (max {MAX_BATCH})")]
    BatchTooLarge(usize),

    #[error("event store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::InvalidArgument(msg) => AppError::BadRequest(msg),
            AnalyticsError::StoreUnavailable(e) => AppError::StoreUnavailable(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            AppError::BatchTooLarge(_) => (
                StatusCode::BAD_REQUEST,
                "batch_too_large",
                format!("Batch exceeds maximum of {MAX_BATCH} events"),
            ),
            AppError::StoreUnavailable(e) => {
                tracing::error!(error = %e, "Event store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "Event store unavailable".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message,
                    "field": null
                }
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analytics_errors_map_to_client_and_store_statuses() {
        let invalid: AppError = AnalyticsError::invalid("limit must not be negative").into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let down: AppError =
            AnalyticsError::StoreUnavailable(anyhow::anyhow!("connection refused")).into();
        assert_eq!(
            down.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
