use std::sync::Arc;

use tracing::{debug, info};

use eventscope_core::{
    config::Config,
    event::{Event, EventId, LiveEvent},
    AnalyticsEngine, BroadcastHub, EventStore, HubConfig,
};
use eventscope_duckdb::DuckDbBackend;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
///
/// The store, the analytics engine and the broadcast hub are created once at
/// startup and live until the process exits. Every field is an `Arc`, so
/// handlers and spawned subscriber tasks share the same instances.
pub struct AppState {
    /// The DuckDB backend. Internally uses `Arc<tokio::sync::Mutex<Connection>>`
    /// so it is already cheap to clone and async-safe.
    pub db: Arc<DuckDbBackend>,

    /// Read-only analytics over `db`.
    pub engine: AnalyticsEngine,

    /// Live-feed subscriber registry.
    pub hub: Arc<BroadcastHub>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,
}

impl AppState {
    /// Construct a new `AppState` wrapping the given backend and config.
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let db = Arc::new(db);
        let store: Arc<dyn EventStore> = db.clone();
        let hub = BroadcastHub::new(HubConfig {
            buffer: config.live_buffer,
            heartbeat_timeout: config.heartbeat_timeout(),
        });
        Self {
            db,
            engine: AnalyticsEngine::new(store),
            hub: Arc::new(hub),
            config: Arc::new(config),
        }
    }

    /// Persist `events`, then push each one to live subscribers.
    ///
    /// Events are published only after the whole batch has been stored, in
    /// batch order. A failed append publishes nothing.
    pub async fn ingest(&self, events: Vec<Event>) -> anyhow::Result<Vec<EventId>> {
        let ids = self.db.append_batch(&events).await?;

        let mut delivered = 0;
        let mut dropped = 0;
        for event in &events {
            let report = self.hub.publish(LiveEvent::from(event)).await;
            delivered += report.delivered;
            dropped += report.dropped;
        }
        debug!(count = ids.len(), delivered, "Ingested events");
        if dropped > 0 {
            info!(dropped, "Live subscribers dropped during ingestion");
        }
        Ok(ids)
    }

    /// Background loop: close live subscribers that stopped sending
    /// heartbeats. Spawned from `main.rs`; returns after hub shutdown.
    pub async fn run_heartbeat_reaper(self: Arc<Self>) {
        let interval = self.config.heartbeat_sweep_interval();
        Arc::clone(&self.hub).run_reaper_loop(interval).await;
    }
}
