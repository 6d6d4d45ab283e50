use anyhow::Result;

use eventscope_core::analytics::LiveSummary;

use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Whole-table counters for the realtime dashboard.
    ///
    /// `active_sessions` counts distinct non-empty session ids.
    pub async fn totals(&self) -> Result<LiveSummary> {
        let conn = self.conn.lock().await;
        let (total_events, active_sessions, avg_duration): (i64, i64, Option<f64>) = conn
            .prepare(
                "SELECT COUNT(*), \
                        COUNT(DISTINCT NULLIF(session_id, '')), \
                        AVG(duration)::DOUBLE \
                 FROM events",
            )?
            .query_row([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;

        Ok(LiveSummary {
            total_events,
            active_sessions,
            avg_duration: avg_duration.map_or(0.0, |avg| (avg * 100.0).round() / 100.0),
        })
    }
}
