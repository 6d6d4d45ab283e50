use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use eventscope_core::event::{Event, EventId};

use crate::schema::init_sql;

/// Timestamp format used for every `TIMESTAMP` parameter bound by this crate.
pub(crate) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub(crate) fn ts_param(at: DateTime<Utc>) -> String {
    at.format(TS_FORMAT).to_string()
}

/// Convert `epoch_us("time")` back into a UTC timestamp.
pub(crate) fn ts_from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| anyhow!("event timestamp out of range: {micros}"))
}

/// A DuckDB-backed event store.
///
/// DuckDB is single-writer: concurrent reads are fine, but concurrent writes
/// cause contention. The connection sits behind `Arc<Mutex<_>>` so every
/// statement runs inside one lock acquisition; a range scan therefore never
/// observes a half-written batch.
///
/// Memory and thread limits are enforced by [`init_sql`] at open time.
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`.
    /// Runs the schema init SQL so the events table exists before the first
    /// append.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        info!(
            "DuckDB opened at {} with memory_limit={}, threads=2",
            path, memory_limit
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an **in-memory** DuckDB database.
    ///
    /// Intended for tests only; data is discarded when the struct is dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Append one event. Returns the event's id.
    pub async fn append(&self, event: &Event) -> Result<EventId> {
        let conn = self.conn.lock().await;
        insert_event(&conn, event)?;
        Ok(event.id.clone())
    }

    /// Append a batch of events in a single transaction.
    ///
    /// Either every event is stored or none is. Returns immediately (no-op)
    /// if `events` is empty.
    pub async fn append_batch(&self, events: &[Event]) -> Result<Vec<EventId>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for event in events {
            insert_event(&tx, event)?;
        }
        tx.commit()?;

        tracing::debug!("Inserted {} events into DuckDB", events.len());
        Ok(events.iter().map(|e| e.id.clone()).collect())
    }

    /// Execute `SELECT 1` as a lightweight liveness check.
    ///
    /// Called by the `/health` endpoint. Returns an error if the connection
    /// is unavailable (file locked, disk full, etc.).
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }
}

fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    if event.duration < 0 {
        return Err(anyhow!("event duration must not be negative"));
    }
    conn.execute(
        r#"INSERT INTO events (
            id, "time", page, user_agent, ip_address, referrer, session_id, duration
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        duckdb::params![
            event.id,
            ts_param(event.time),
            event.page,
            event.user_agent,
            event.ip_address,
            event.referrer,
            event.session_id,
            event.duration,
        ],
    )?;
    Ok(())
}
