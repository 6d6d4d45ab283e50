//! Session reconstruction.
//!
//! A session is every event in the window sharing one non-empty
//! `session_id`. There is no inactivity timeout: two events a week apart with
//! the same id are the same session.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::{checked_limit, round2};
use crate::error::AnalyticsResult;
use crate::event::Event;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub session_id: String,
    pub page_count: i64,
    pub total_duration: i64,
    pub first_page: String,
    pub last_page: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub is_bounce: bool,
}

struct SessionAcc<'a> {
    page_count: i64,
    total_duration: i64,
    first: (DateTime<Utc>, &'a str),
    last: (DateTime<Utc>, &'a str),
}

/// Group events into sessions, most recently started first.
///
/// Timestamp ties inside a session resolve by page name (smallest page for
/// `first_page`, largest for `last_page`), and ties between sessions resolve
/// by `session_id`, so the output does not depend on input order.
pub fn reconstruct_sessions(events: &[Event]) -> Vec<Session> {
    let mut by_id: HashMap<&str, SessionAcc<'_>> = HashMap::new();

    for event in events {
        let Some(session_id) = event.session_key() else {
            continue;
        };
        let key = (event.time, event.page.as_str());
        by_id
            .entry(session_id)
            .and_modify(|acc| {
                acc.page_count += 1;
                acc.total_duration += event.duration;
                if key < acc.first {
                    acc.first = key;
                }
                if key > acc.last {
                    acc.last = key;
                }
            })
            .or_insert(SessionAcc {
                page_count: 1,
                total_duration: event.duration,
                first: key,
                last: key,
            });
    }

    let mut sessions: Vec<Session> = by_id
        .into_iter()
        .map(|(session_id, acc)| Session {
            session_id: session_id.to_string(),
            page_count: acc.page_count,
            total_duration: acc.total_duration,
            first_page: acc.first.1.to_string(),
            last_page: acc.last.1.to_string(),
            started_at: acc.first.0,
            ended_at: acc.last.0,
            is_bounce: acc.page_count == 1,
        })
        .collect();

    sessions.sort_by(|a, b| {
        b.started_at
            .cmp(&a.started_at)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    sessions
}

pub fn list_sessions(events: &[Event], limit: i64) -> AnalyticsResult<Vec<Session>> {
    let limit = checked_limit(limit)?;
    let mut sessions = reconstruct_sessions(events);
    sessions.truncate(limit);
    Ok(sessions)
}

/// Percentage of sessions with exactly one event; 0 when there are none.
pub fn bounce_rate(events: &[Event]) -> f64 {
    let sessions = reconstruct_sessions(events);
    if sessions.is_empty() {
        return 0.0;
    }
    let bounces = sessions.iter().filter(|s| s.is_bounce).count();
    round2(bounces as f64 / sessions.len() as f64 * 100.0)
}
