/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `EVENTSCOPE_DUCKDB_MEMORY`, default `"1GB"`). Always set an explicit
/// limit: the DuckDB default of 80% of system RAM is not acceptable for a
/// server process.
///
/// `events` is append-only. Rows are never updated or deleted by this crate.
/// `time` is stored as a UTC `TIMESTAMP` at microsecond precision.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- EVENTS (append-only page views)
-- ===========================================
CREATE TABLE IF NOT EXISTS events (
    id              VARCHAR NOT NULL,              -- UUID v4
    "time"          TIMESTAMP NOT NULL,            -- UTC, may arrive out of order
    page            VARCHAR NOT NULL,
    user_agent      VARCHAR NOT NULL DEFAULT '',
    ip_address      VARCHAR NOT NULL DEFAULT '',
    referrer        VARCHAR,                       -- NULL or '' means direct
    session_id      VARCHAR,                       -- NULL or '' means unattributed
    duration        BIGINT NOT NULL DEFAULT 0      -- seconds on page, >= 0
);

-- Primary query pattern: time range scan
CREATE INDEX IF NOT EXISTS idx_events_time
    ON events("time");

-- Accelerates distinct-session counts
CREATE INDEX IF NOT EXISTS idx_events_session_time
    ON events(session_id, "time");
"#
    )
}
