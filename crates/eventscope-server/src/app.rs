use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `TraceLayer`: structured request/response logging via `tracing`.
/// 2. `CorsLayer`: any origin unless `EVENTSCOPE_CORS_ORIGINS` narrows it.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/events",
            post(routes::collect::collect).get(routes::events::list_event_buckets),
        )
        .route(
            "/api/analytics/sessions",
            get(routes::sessions::list_sessions),
        )
        .route(
            "/api/analytics/bounce-rate",
            get(routes::sessions::bounce_rate),
        )
        .route("/api/analytics/funnel", get(routes::funnels::get_funnel))
        .route(
            "/api/analytics/retention",
            get(routes::retention::get_retention),
        )
        .route("/api/analytics/pages", get(routes::pages::page_metrics))
        .route("/api/analytics/top-pages", get(routes::pages::top_pages))
        .route(
            "/api/analytics/traffic-sources",
            get(routes::traffic::traffic_sources),
        )
        .route("/api/analytics/devices", get(routes::traffic::devices))
        .route("/api/analytics/daily", get(routes::timeseries::daily))
        .route("/api/analytics/hourly", get(routes::timeseries::hourly))
        .route("/api/realtime/stats", get(routes::realtime::get_stats))
        .route("/api/realtime/ws", get(routes::realtime::live_feed))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("No such route".to_string())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}
