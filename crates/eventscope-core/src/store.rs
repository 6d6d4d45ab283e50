//! Event store abstraction.

use chrono::{DateTime, Utc};

use crate::analytics::LiveSummary;
use crate::event::{Event, EventId};

/// An append-only, time-ordered table of events.
///
/// Implementations must give readers at least read-committed isolation: a
/// range scan never observes a half-written event, though it may miss events
/// appended while the scan runs.
#[async_trait::async_trait]
pub trait EventStore: Send + Sync + 'static {
    async fn append(&self, event: &Event) -> anyhow::Result<EventId>;

    /// Append a batch atomically. Returns ids in input order.
    async fn append_batch(&self, events: &[Event]) -> anyhow::Result<Vec<EventId>>;

    /// Events with `since <= time`, and `time < until` when an upper bound is
    /// given, ascending by time.
    async fn query_range(
        &self,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Event>>;

    /// Whole-table counters, computed by the store without a range scan.
    async fn totals(&self) -> anyhow::Result<LiveSummary>;
}
