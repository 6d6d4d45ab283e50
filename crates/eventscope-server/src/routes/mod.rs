pub mod collect;
pub mod events;
pub mod funnels;
pub mod health;
pub mod pages;
pub mod realtime;
pub mod retention;
pub mod sessions;
pub mod timeseries;
pub mod traffic;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::AppError;

/// Look-back applied when a request omits `hours`.
pub const DEFAULT_HOURS: i64 = 24;

/// `?hours=N` query parameter shared by the windowed analytics endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub hours: Option<i64>,
}

impl WindowParams {
    pub fn since(&self) -> Result<DateTime<Utc>, AppError> {
        since_hours(self.hours)
    }
}

/// `?hours=N&limit=M` for the ranked endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct RankedParams {
    pub hours: Option<i64>,
    pub limit: Option<i64>,
}

/// Start of a look-back window of `hours` (default [`DEFAULT_HOURS`]).
pub(crate) fn since_hours(hours: Option<i64>) -> Result<DateTime<Utc>, AppError> {
    let hours = hours.unwrap_or(DEFAULT_HOURS);
    if hours <= 0 {
        return Err(AppError::BadRequest("hours must be positive".to_string()));
    }
    Duration::try_hours(hours)
        .and_then(|span| Utc::now().checked_sub_signed(span))
        .ok_or_else(|| AppError::BadRequest("hours is out of range".to_string()))
}

/// Check an optional `limit` against `1..=max`, falling back to `default`.
///
/// Negative limits are passed through so the engine rejects them with its
/// own message.
pub(crate) fn bounded_limit(limit: Option<i64>, default: i64, max: i64) -> Result<i64, AppError> {
    let limit = limit.unwrap_or(default);
    if limit > max {
        return Err(AppError::BadRequest(format!(
            "limit must be at most {max}"
        )));
    }
    Ok(limit)
}

/// Split a comma-separated list, dropping blank entries.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
