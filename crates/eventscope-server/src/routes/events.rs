use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{error::AppError, routes::since_hours, routes::split_list, state::AppState};

const DEFAULT_BUCKET_MINUTES: i64 = 60;

#[derive(Debug, Deserialize)]
pub struct EventBucketsQuery {
    pub hours: Option<i64>,
    pub bucket_minutes: Option<i64>,
    /// Comma-separated page filter. Absent means every page.
    pub pages: Option<String>,
}

/// `GET /api/events`: event counts per time bucket, page and OS.
#[tracing::instrument(skip(state))]
pub async fn list_event_buckets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventBucketsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let since = since_hours(query.hours)?;
    let bucket_minutes = query.bucket_minutes.unwrap_or(DEFAULT_BUCKET_MINUTES);
    let pages = query.pages.as_deref().map(split_list);

    let buckets = state
        .engine
        .event_buckets(since, bucket_minutes, pages.as_deref())
        .await?;

    Ok(Json(json!({ "data": buckets })))
}
