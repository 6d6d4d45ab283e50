use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{
    error::AppError,
    routes::{bounded_limit, since_hours, RankedParams, WindowParams},
    state::AppState,
};

const DEFAULT_SESSION_LIMIT: i64 = 100;
const MAX_SESSION_LIMIT: i64 = 1000;

/// `GET /api/analytics/sessions`: reconstructed sessions, most recent first.
#[tracing::instrument(skip(state))]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RankedParams>,
) -> Result<impl IntoResponse, AppError> {
    let since = since_hours(query.hours)?;
    let limit = bounded_limit(query.limit, DEFAULT_SESSION_LIMIT, MAX_SESSION_LIMIT)?;

    let sessions = state.engine.list_sessions(since, limit).await?;

    Ok(Json(json!({ "data": sessions })))
}

/// `GET /api/analytics/bounce-rate`: share of single-page sessions, in percent.
#[tracing::instrument(skip(state))]
pub async fn bounce_rate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowParams>,
) -> Result<impl IntoResponse, AppError> {
    let rate = state.engine.bounce_rate(query.since()?).await?;

    Ok(Json(json!({ "data": { "bounce_rate": rate } })))
}
