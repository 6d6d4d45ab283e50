use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use eventscope_server::state::AppState;

/// `eventscope health`: liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$EVENTSCOPE_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("EVENTSCOPE_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }
    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("eventscope=info".parse()?),
        )
        .json()
        .init();

    let cfg = eventscope_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Ensure data directory exists before opening DuckDB.
    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/eventscope.db", cfg.data_dir);

    // Open DuckDB; this initialises the events table.
    let db = eventscope_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    let state = Arc::new(AppState::new(db, cfg.clone()));

    // Spawn the live-feed heartbeat reaper. It exits on hub shutdown.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.run_heartbeat_reaper().await;
        });
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = eventscope_server::app::build_app(Arc::clone(&state));

    info!(
        port = cfg.port,
        cohort_alignment = ?cfg.cohort_alignment,
        "Eventscope listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let state_for_shutdown = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            // Closing the hub ends every subscriber task, which lets the open
            // WebSocket connections drain.
            state_for_shutdown.hub.shutdown().await;
        })
        .await?;

    info!("Eventscope stopped");
    Ok(())
}
