use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::analytics::{
    self, CohortAlignment, DailyRollup, DeviceRow, EventBucket, FunnelStep, HourlyBucket,
    LiveSummary, PageMetric, PageViews, RetentionCohort, TrafficSourceRow,
};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::event::Event;
use crate::session::{self, Session};
use crate::store::EventStore;

/// Read-only analytics over an [`EventStore`].
///
/// Each query validates its arguments, fetches every event with
/// `time >= since` (client clocks may run ahead of ours) with a single scan and aggregates it in memory. Queries share no mutable
/// state, so any number may run concurrently with each other and with
/// ingestion. Store failures surface as [`AnalyticsError::StoreUnavailable`]
/// and are not retried here.
#[derive(Clone)]
pub struct AnalyticsEngine {
    store: Arc<dyn EventStore>,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    async fn window(&self, since: DateTime<Utc>) -> AnalyticsResult<Vec<Event>> {
        let events = self
            .store
            .query_range(since, None)
            .await
            .map_err(AnalyticsError::StoreUnavailable)?;
        tracing::debug!(%since, count = events.len(), "Loaded analytics window");
        Ok(events)
    }

    pub async fn list_sessions(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AnalyticsResult<Vec<Session>> {
        analytics::checked_limit(limit)?;
        let events = self.window(since).await?;
        session::list_sessions(&events, limit)
    }

    pub async fn bounce_rate(&self, since: DateTime<Utc>) -> AnalyticsResult<f64> {
        let events = self.window(since).await?;
        Ok(session::bounce_rate(&events))
    }

    pub async fn daily_rollup(&self, since: DateTime<Utc>) -> AnalyticsResult<Vec<DailyRollup>> {
        let events = self.window(since).await?;
        Ok(analytics::daily_rollup(&events))
    }

    pub async fn hourly_histogram(
        &self,
        since: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<HourlyBucket>> {
        let events = self.window(since).await?;
        Ok(analytics::hourly_histogram(&events))
    }

    pub async fn top_pages(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AnalyticsResult<Vec<PageViews>> {
        analytics::checked_limit(limit)?;
        let events = self.window(since).await?;
        analytics::top_pages(&events, limit)
    }

    pub async fn funnel(
        &self,
        pages: &[String],
        since: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<FunnelStep>> {
        if pages.is_empty() {
            return Ok(Vec::new());
        }
        let events = self.window(since).await?;
        Ok(analytics::funnel(&events, pages))
    }

    pub async fn retention(
        &self,
        days: i64,
        since: DateTime<Utc>,
        alignment: CohortAlignment,
    ) -> AnalyticsResult<Vec<RetentionCohort>> {
        // Validate the buckets before touching the store.
        analytics::cohort_bounds(since, days, alignment)?;
        let events = self.window(since).await?;
        analytics::retention(&events, since, days, alignment)
    }

    pub async fn page_metrics(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AnalyticsResult<Vec<PageMetric>> {
        analytics::checked_limit(limit)?;
        let events = self.window(since).await?;
        analytics::page_metrics(&events, limit)
    }

    pub async fn traffic_sources(
        &self,
        since: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<TrafficSourceRow>> {
        let events = self.window(since).await?;
        Ok(analytics::traffic_sources(&events))
    }

    pub async fn device_breakdown(&self, since: DateTime<Utc>) -> AnalyticsResult<Vec<DeviceRow>> {
        let events = self.window(since).await?;
        Ok(analytics::device_breakdown(&events))
    }

    pub async fn event_buckets(
        &self,
        since: DateTime<Utc>,
        bucket_minutes: i64,
        pages: Option<&[String]>,
    ) -> AnalyticsResult<Vec<EventBucket>> {
        if bucket_minutes <= 0 {
            return Err(AnalyticsError::invalid("bucket_minutes must be positive"));
        }
        let events = self.window(since).await?;
        analytics::event_buckets(&events, bucket_minutes, pages)
    }

    pub async fn live_summary(&self) -> AnalyticsResult<LiveSummary> {
        self.store
            .totals()
            .await
            .map_err(AnalyticsError::StoreUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Duration;

    use crate::event::EventId;

    /// Fixed event list; counts scans and can be switched to fail.
    struct FixtureStore {
        events: Vec<Event>,
        fail: bool,
        scans: AtomicUsize,
    }

    impl FixtureStore {
        fn new(events: Vec<Event>) -> Self {
            Self {
                events,
                fail: false,
                scans: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }
    }

    #[async_trait::async_trait]
    impl EventStore for FixtureStore {
        async fn append(&self, event: &Event) -> anyhow::Result<EventId> {
            Ok(event.id.clone())
        }

        async fn append_batch(&self, events: &[Event]) -> anyhow::Result<Vec<EventId>> {
            Ok(events.iter().map(|e| e.id.clone()).collect())
        }

        async fn query_range(
            &self,
            since: DateTime<Utc>,
            until: Option<DateTime<Utc>>,
        ) -> anyhow::Result<Vec<Event>> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("connection refused");
            }
            let mut events: Vec<Event> = self
                .events
                .iter()
                .filter(|e| e.time >= since && until.map_or(true, |u| e.time < u))
                .cloned()
                .collect();
            events.sort_by_key(|e| e.time);
            Ok(events)
        }

        async fn totals(&self) -> anyhow::Result<LiveSummary> {
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(LiveSummary::default())
        }
    }

    fn ago(minutes: i64) -> DateTime<Utc> {
        Utc::now() - Duration::minutes(minutes)
    }

    #[tokio::test]
    async fn window_excludes_events_before_since() {
        let store = Arc::new(FixtureStore::new(vec![
            Event::new(ago(120), "/").with_session("old"),
            Event::new(ago(30), "/").with_session("s1"),
            Event::new(ago(20), "/pricing").with_session("s1"),
        ]));
        let engine = AnalyticsEngine::new(store);
        let sessions = engine.list_sessions(ago(60), 10).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].page_count, 2);

        let total: i64 = engine
            .daily_rollup(ago(60))
            .await
            .unwrap()
            .iter()
            .map(|d| d.event_count)
            .sum();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn events_stamped_ahead_of_the_clock_are_counted() {
        let store = Arc::new(FixtureStore::new(vec![
            Event::new(ago(5), "/").with_session("s1"),
            Event::new(ago(-5), "/pricing").with_session("s1"),
            Event::new(ago(-90), "/signup").with_session("s2"),
        ]));
        let engine = AnalyticsEngine::new(store);

        let total: i64 = engine
            .daily_rollup(ago(60))
            .await
            .unwrap()
            .iter()
            .map(|d| d.event_count)
            .sum();
        assert_eq!(total, 3);

        let sessions = engine.list_sessions(ago(60), 10).await.unwrap();
        assert_eq!(sessions.len(), 2);
        let s1 = sessions.iter().find(|s| s.session_id == "s1").unwrap();
        assert_eq!(s1.page_count, 2);

        // A look-back that starts in the future still sees what is stamped there.
        let ahead = engine.top_pages(ago(-60), 10).await.unwrap();
        assert_eq!(ahead.len(), 1);
        assert_eq!(ahead[0].page, "/signup");
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_the_store() {
        let store = Arc::new(FixtureStore::new(Vec::new()));
        let engine = AnalyticsEngine::new(store.clone());

        let err = engine.page_metrics(ago(60), -1).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidArgument(_)));
        assert!(engine.top_pages(ago(60), -3).await.is_err());
        assert!(engine
            .retention(-7, ago(60), CohortAlignment::Window)
            .await
            .is_err());
        assert!(engine.event_buckets(ago(60), 0, None).await.is_err());
        assert_eq!(store.scans.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_failure_fails_the_whole_call() {
        let engine = AnalyticsEngine::new(Arc::new(FixtureStore::failing()));
        let err = engine
            .retention(28, ago(28 * 24 * 60), CohortAlignment::Window)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::StoreUnavailable(_)));
        assert_eq!(err.describe().kind, crate::error::ErrorKind::StoreUnavailable);
        assert!(engine.live_summary().await.is_err());
    }

    #[tokio::test]
    async fn empty_store_yields_zeroed_results() {
        let engine = AnalyticsEngine::new(Arc::new(FixtureStore::new(Vec::new())));
        let since = ago(24 * 60);
        assert!(engine.list_sessions(since, 100).await.unwrap().is_empty());
        assert_eq!(engine.bounce_rate(since).await.unwrap(), 0.0);
        assert!(engine.traffic_sources(since).await.unwrap().is_empty());
        assert!(engine.device_breakdown(since).await.unwrap().is_empty());
        let funnel = engine
            .funnel(&["/".to_string(), "/signup".to_string()], since)
            .await
            .unwrap();
        assert!(funnel.iter().all(|s| s.visitors == 0));
    }

    #[tokio::test]
    async fn empty_funnel_skips_the_scan() {
        let store = Arc::new(FixtureStore::new(Vec::new()));
        let engine = AnalyticsEngine::new(store.clone());
        assert!(engine.funnel(&[], ago(60)).await.unwrap().is_empty());
        assert_eq!(store.scans.load(Ordering::SeqCst), 0);
    }
}
