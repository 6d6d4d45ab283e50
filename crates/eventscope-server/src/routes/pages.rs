use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{
    error::AppError,
    routes::{bounded_limit, since_hours, RankedParams},
    state::AppState,
};

const DEFAULT_PAGE_LIMIT: i64 = 10;
const MAX_PAGE_LIMIT: i64 = 100;

/// `GET /api/analytics/pages`: per-page views, visitors, duration, bounce
/// rate and top referrers, busiest page first.
#[tracing::instrument(skip(state))]
pub async fn page_metrics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RankedParams>,
) -> Result<impl IntoResponse, AppError> {
    let since = since_hours(query.hours)?;
    let limit = bounded_limit(query.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT)?;

    let metrics = state.engine.page_metrics(since, limit).await?;

    Ok(Json(json!({ "data": metrics })))
}

/// `GET /api/analytics/top-pages`: view counts only.
#[tracing::instrument(skip(state))]
pub async fn top_pages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RankedParams>,
) -> Result<impl IntoResponse, AppError> {
    let since = since_hours(query.hours)?;
    let limit = bounded_limit(query.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT)?;

    let pages = state.engine.top_pages(since, limit).await?;

    Ok(Json(json!({ "data": pages })))
}
