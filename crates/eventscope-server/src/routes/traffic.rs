use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{error::AppError, routes::WindowParams, state::AppState};

/// `GET /api/analytics/traffic-sources`: visits per classified referrer source.
#[tracing::instrument(skip(state))]
pub async fn traffic_sources(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowParams>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state.engine.traffic_sources(query.since()?).await?;
    Ok(Json(json!({ "data": rows })))
}

/// `GET /api/analytics/devices`: visits per (device, browser, OS).
#[tracing::instrument(skip(state))]
pub async fn devices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowParams>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state.engine.device_breakdown(query.since()?).await?;
    Ok(Json(json!({ "data": rows })))
}
