use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{classify_user_agent, Browser, DeviceType, Os};

/// Opaque identifier returned by the store for an appended event.
pub type EventId = String;

/// The payload the client sends to POST /api/events.
///
/// Only `page` is required. The server fills `user_agent` and `ip_address`
/// from request headers when the client leaves them out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestPayload {
    pub page: String,
    /// Client-side timestamp. Defaults to the ingestion time when absent.
    pub time: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub referrer: Option<String>,
    pub session_id: Option<String>,
    /// Seconds spent on the page. Negative values are rejected at ingestion.
    pub duration: Option<i64>,
}

/// Accepts either a single event or a batch array at POST /api/events.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IngestOrBatch {
    Single(Box<IngestPayload>),
    Batch(Vec<IngestPayload>),
}

/// A stored page-view event. Mirrors the `events` table columns exactly.
///
/// Events are immutable once appended. `time` is not guaranteed to be
/// monotonic across appends: clients may deliver events out of order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub time: DateTime<Utc>,
    pub page: String,
    pub user_agent: String,
    pub ip_address: String,
    /// `None` or empty means direct traffic.
    pub referrer: Option<String>,
    /// `None` or empty means the event is not attributed to a session.
    pub session_id: Option<String>,
    pub duration: i64,
}

impl Event {
    /// Build a new event with a fresh UUID v4 id.
    pub fn new(time: DateTime<Utc>, page: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            time,
            page: page.into(),
            user_agent: String::new(),
            ip_address: String::new(),
            referrer: None,
            session_id: None,
            duration: 0,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    /// The session this event belongs to, or `None` when unattributed.
    pub fn session_key(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|s| !s.is_empty())
    }

    /// The referrer, or `None` for direct traffic.
    pub fn referrer_key(&self) -> Option<&str> {
        self.referrer.as_deref().filter(|s| !s.is_empty())
    }
}

/// The JSON object pushed to live-feed subscribers for each ingested event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub id: EventId,
    pub time: DateTime<Utc>,
    pub page: String,
    pub duration: i64,
    pub referrer: Option<String>,
    pub session_id: Option<String>,
    pub os: Os,
    pub browser: Browser,
    pub device: DeviceType,
}

impl From<&Event> for LiveEvent {
    fn from(event: &Event) -> Self {
        let client = classify_user_agent(&event.user_agent);
        Self {
            id: event.id.clone(),
            time: event.time,
            page: event.page.clone(),
            duration: event.duration,
            referrer: event.referrer_key().map(str::to_string),
            session_id: event.session_key().map(str::to_string),
            os: client.os,
            browser: client.browser,
            device: client.device,
        }
    }
}
