use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use eventscope_core::event::{Event, IngestOrBatch, IngestPayload};

use crate::{
    error::{AppError, MAX_BATCH},
    state::AppState,
};

/// `POST /api/events`: ingest a single event or a batch of up to 50 events.
///
/// ## Batch rules
/// - Maximum **50** events per batch (returns 400 `batch_too_large` otherwise).
/// - Every event is validated before any is stored; one bad event rejects
///   the whole request.
///
/// ## Defaults
/// - `user_agent`: the request's `User-Agent` header.
/// - `ip_address`: first `X-Forwarded-For` entry.
/// - `time`: ingestion time. `duration`: 0.
///
/// Stored events are pushed to live-feed subscribers after the append.
///
/// ## Response
/// `202 Accepted` with `{ "data": { "ids": [...] } }`.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn collect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<IngestOrBatch>,
) -> Result<impl IntoResponse, AppError> {
    let payloads: Vec<IngestPayload> = match payload {
        IngestOrBatch::Single(p) => vec![*p],
        IngestOrBatch::Batch(v) => v,
    };

    if payloads.len() > MAX_BATCH {
        return Err(AppError::BatchTooLarge(payloads.len()));
    }
    if payloads.is_empty() {
        return Err(AppError::BadRequest("empty batch".to_string()));
    }

    let client_ip = extract_client_ip(&headers);
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let received_at = Utc::now();
    let events = payloads
        .into_iter()
        .map(|p| build_event(p, received_at, &user_agent, &client_ip))
        .collect::<Result<Vec<_>, _>>()?;

    let ids = state
        .ingest(events)
        .await
        .map_err(AppError::StoreUnavailable)?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "data": { "ids": ids } }))))
}

fn build_event(
    payload: IngestPayload,
    received_at: chrono::DateTime<Utc>,
    user_agent: &str,
    client_ip: &str,
) -> Result<Event, AppError> {
    if payload.page.trim().is_empty() {
        return Err(AppError::BadRequest("page must not be empty".to_string()));
    }
    let duration = payload.duration.unwrap_or(0);
    if duration < 0 {
        return Err(AppError::BadRequest(
            "duration must not be negative".to_string(),
        ));
    }

    let mut event = Event::new(payload.time.unwrap_or(received_at), payload.page);
    event.user_agent = payload.user_agent.unwrap_or_else(|| user_agent.to_string());
    event.ip_address = payload.ip_address.unwrap_or_else(|| client_ip.to_string());
    event.referrer = payload.referrer;
    event.session_id = payload.session_id;
    event.duration = duration;
    Ok(event)
}

/// Extract the client IP from `X-Forwarded-For` (first entry).
///
/// Falls back to an empty string, matching the column default.
fn extract_client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn payload(page: &str) -> IngestPayload {
        IngestPayload {
            page: page.to_string(),
            time: None,
            user_agent: None,
            ip_address: None,
            referrer: None,
            session_id: None,
            duration: None,
        }
    }

    #[test]
    fn header_values_fill_missing_client_fields() {
        let now = Utc::now();
        let event = build_event(payload("/"), now, "curl/8.0", "198.51.100.4").unwrap();
        assert_eq!(event.time, now);
        assert_eq!(event.user_agent, "curl/8.0");
        assert_eq!(event.ip_address, "198.51.100.4");
        assert_eq!(event.duration, 0);
    }

    #[test]
    fn explicit_payload_fields_win_over_headers() {
        let mut p = payload("/pricing");
        p.user_agent = Some("Mozilla/5.0".to_string());
        p.ip_address = Some("203.0.113.9".to_string());
        let event = build_event(p, Utc::now(), "curl/8.0", "198.51.100.4").unwrap();
        assert_eq!(event.user_agent, "Mozilla/5.0");
        assert_eq!(event.ip_address, "203.0.113.9");
    }

    #[test]
    fn negative_duration_and_blank_page_are_rejected() {
        let mut p = payload("/");
        p.duration = Some(-1);
        assert!(build_event(p, Utc::now(), "", "").is_err());
        assert!(build_event(payload("  "), Utc::now(), "", "").is_err());
    }

    #[test]
    fn first_forwarded_address_is_used() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 10.0.0.1"),
        );
        assert_eq!(extract_client_ip(&headers), "203.0.113.1");
        assert_eq!(extract_client_ip(&HeaderMap::new()), "");
    }
}
