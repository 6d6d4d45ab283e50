use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use eventscope_core::analytics::CohortAlignment;

use crate::{error::AppError, state::AppState};

const DEFAULT_RETENTION_DAYS: i64 = 30;
const MAX_RETENTION_DAYS: i64 = 366;

#[derive(Debug, Deserialize)]
pub struct RetentionParams {
    pub days: Option<i64>,
    /// `window` or `calendar_week`. Defaults to the server configuration.
    pub alignment: Option<String>,
}

/// `GET /api/analytics/retention`: weekly cohorts over the last `days` days.
#[tracing::instrument(skip(state))]
pub async fn get_retention(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RetentionParams>,
) -> Result<impl IntoResponse, AppError> {
    let days = params.days.unwrap_or(DEFAULT_RETENTION_DAYS);
    if days > MAX_RETENTION_DAYS {
        return Err(AppError::BadRequest(format!(
            "days must be at most {MAX_RETENTION_DAYS}"
        )));
    }
    let alignment = match params.alignment.as_deref() {
        Some(raw) => CohortAlignment::parse(Some(raw))?,
        None => state.config.cohort_alignment,
    };
    // Negative `days` is rejected by the engine; clamp only the look-back.
    let since = Utc::now() - Duration::days(days.max(0));

    let cohorts = state.engine.retention(days, since, alignment).await?;

    Ok(Json(json!({ "data": cohorts })))
}
