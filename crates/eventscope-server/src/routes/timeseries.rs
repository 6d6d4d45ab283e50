use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{error::AppError, routes::WindowParams, state::AppState};

/// `GET /api/analytics/daily`: events and sessions per UTC day.
#[tracing::instrument(skip(state))]
pub async fn daily(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowParams>,
) -> Result<impl IntoResponse, AppError> {
    let days = state.engine.daily_rollup(query.since()?).await?;
    Ok(Json(json!({ "data": days })))
}

/// `GET /api/analytics/hourly`: 24 hour-of-day buckets, zero-filled.
#[tracing::instrument(skip(state))]
pub async fn hourly(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowParams>,
) -> Result<impl IntoResponse, AppError> {
    let hours = state.engine.hourly_histogram(query.since()?).await?;
    Ok(Json(json!({ "data": hours })))
}
