use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::{debug, warn};

use eventscope_core::SubscriberHandle;

use crate::{error::AppError, state::AppState};

/// `GET /api/realtime/stats`: whole-store counters plus the number of
/// connected live-feed subscribers.
#[tracing::instrument(skip(state))]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let summary = state.engine.live_summary().await?;
    let live_subscribers = state.hub.active_count().await;

    Ok(Json(json!({
        "data": {
            "total_events": summary.total_events,
            "active_sessions": summary.active_sessions,
            "avg_duration": summary.avg_duration,
            "live_subscribers": live_subscribers,
        }
    })))
}

/// `GET /api/realtime/ws`: live event feed.
///
/// The upgrade handshake is the subscriber's connecting phase; it becomes
/// active once registered with the hub. Each delivered event is sent as one
/// JSON text frame. A `"ping"` text frame is answered with `"pong"`, and any
/// inbound frame counts as a heartbeat.
pub async fn live_feed(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_subscriber(socket, state))
}

/// Owns one subscriber's socket until either side goes away.
async fn serve_subscriber(mut socket: WebSocket, state: Arc<AppState>) {
    let mut subscription = state.hub.subscribe().await;
    let handle = subscription.handle();
    let send_timeout = state.config.live_send_timeout();

    loop {
        tokio::select! {
            delivered = subscription.recv() => {
                // `None`: the hub closed us (queue overflow, reaped or shutdown).
                let Some(event) = delivered else { break };
                let payload = match serde_json::to_string(&*event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(subscriber = %handle, error = %e, "Failed to encode live event");
                        continue;
                    }
                };
                if !send_bounded(&mut socket, Message::Text(payload.into()), send_timeout, handle).await {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(message)) => {
                        if !state.hub.heartbeat(handle).await {
                            break;
                        }
                        let is_ping = matches!(&message, Message::Text(text) if text.as_str().trim() == "ping");
                        if is_ping
                            && !send_bounded(&mut socket, Message::Text("pong".into()), send_timeout, handle).await
                        {
                            break;
                        }
                    }
                }
            }
        }
    }

    state.hub.unsubscribe(handle).await;
    debug!(subscriber = %handle, "Live feed socket released");
}

/// Write one frame, giving up after `timeout`. Returns `false` when the
/// socket should be dropped.
async fn send_bounded(
    socket: &mut WebSocket,
    message: Message,
    timeout: Duration,
    handle: SubscriberHandle,
) -> bool {
    match tokio::time::timeout(timeout, socket.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(subscriber = %handle, error = %e, "Live feed write failed");
            false
        }
        Err(_) => {
            warn!(subscriber = %handle, "Live feed write timed out");
            false
        }
    }
}
