use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{error::AppError, routes::since_hours, routes::split_list, state::AppState};

/// Steps used when the caller does not name any.
const DEFAULT_FUNNEL: [&str; 4] = ["/", "/pricing", "/signup", "/dashboard"];

#[derive(Debug, Deserialize)]
pub struct FunnelQuery {
    /// Comma-separated funnel steps, in order. Defaults to the signup funnel.
    pub pages: Option<String>,
    pub hours: Option<i64>,
}

/// `GET /api/analytics/funnel?pages=/,/pricing,/signup`: distinct sessions
/// per step, with conversion relative to the first step.
#[tracing::instrument(skip(state))]
pub async fn get_funnel(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FunnelQuery>,
) -> Result<impl IntoResponse, AppError> {
    let pages = match query.pages.as_deref() {
        Some(raw) => split_list(raw),
        None => DEFAULT_FUNNEL.iter().map(|page| page.to_string()).collect(),
    };
    if pages.is_empty() {
        return Err(AppError::BadRequest(
            "pages must name at least one funnel step".to_string(),
        ));
    }
    let since = since_hours(query.hours)?;

    let steps = state.engine.funnel(&pages, since).await?;

    Ok(Json(json!({ "data": steps })))
}
