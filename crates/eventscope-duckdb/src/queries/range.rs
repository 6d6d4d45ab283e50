use anyhow::Result;
use chrono::{DateTime, Utc};

use eventscope_core::event::Event;

use crate::backend::{ts_from_micros, ts_param};
use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Events with `since <= time`, bounded above by `until` when given,
    /// oldest first.
    ///
    /// Ties on `time` are ordered by `id` so repeated scans of the same data
    /// return the same sequence.
    pub async fn query_range(
        &self,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>> {
        let upper = if until.is_some() {
            r#"AND "time" < CAST(?2 AS TIMESTAMP)"#
        } else {
            ""
        };
        let sql = format!(
            r#"SELECT id, epoch_us("time"), page, user_agent, ip_address,
                      referrer, session_id, duration
               FROM events
               WHERE "time" >= CAST(?1 AS TIMESTAMP) {upper}
               ORDER BY "time" ASC, id ASC"#
        );

        let mut params = vec![ts_param(since)];
        params.extend(until.map(ts_param));

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params_from_iter(params.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, micros, page, user_agent, ip_address, referrer, session_id, duration) = row?;
            events.push(Event {
                id,
                time: ts_from_micros(micros)?,
                page,
                user_agent,
                ip_address,
                referrer,
                session_id,
                duration,
            });
        }
        Ok(events)
    }
}
