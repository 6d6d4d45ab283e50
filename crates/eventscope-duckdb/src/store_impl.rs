use async_trait::async_trait;
use chrono::{DateTime, Utc};

use eventscope_core::analytics::LiveSummary;
use eventscope_core::event::{Event, EventId};
use eventscope_core::store::EventStore;

use crate::DuckDbBackend;

#[async_trait]
impl EventStore for DuckDbBackend {
    async fn append(&self, event: &Event) -> anyhow::Result<EventId> {
        DuckDbBackend::append(self, event).await
    }

    async fn append_batch(&self, events: &[Event]) -> anyhow::Result<Vec<EventId>> {
        DuckDbBackend::append_batch(self, events).await
    }

    async fn query_range(
        &self,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Event>> {
        DuckDbBackend::query_range(self, since, until).await
    }

    async fn totals(&self) -> anyhow::Result<LiveSummary> {
        DuckDbBackend::totals(self).await
    }
}
