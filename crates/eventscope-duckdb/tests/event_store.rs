use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use eventscope_core::analytics::CohortAlignment;
use eventscope_core::event::Event;
use eventscope_core::{AnalyticsEngine, EventStore};
use eventscope_duckdb::DuckDbBackend;

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - Duration::minutes(minutes)
}

#[tokio::test]
async fn appended_event_is_read_back_intact() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let mut event = Event::new(at(0) + Duration::microseconds(123_456), "/pricing")
        .with_session("s1")
        .with_referrer("https://www.google.com/search")
        .with_user_agent("Mozilla/5.0 (Macintosh) Safari/605.1.15")
        .with_duration(42);
    event.ip_address = "203.0.113.7".to_string();

    let id = db.append(&event).await.expect("append");
    assert_eq!(id, event.id);

    let events = db.query_range(at(-1), Some(at(1))).await.expect("query");
    assert_eq!(events, vec![event]);
}

#[tokio::test]
async fn range_is_half_open_and_time_ordered() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    // Appended out of order on purpose.
    for minute in [30, 0, 10, 60, 20] {
        db.append(&Event::new(at(minute), format!("/m{minute}")))
            .await
            .expect("append");
    }

    let pages: Vec<String> = db
        .query_range(at(10), Some(at(60)))
        .await
        .expect("query")
        .into_iter()
        .map(|e| e.page)
        .collect();
    assert_eq!(pages, vec!["/m10", "/m20", "/m30"]);
}

#[tokio::test]
async fn open_ended_range_has_no_upper_bound() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    for minute in [0, 10, 100_000] {
        db.append(&Event::new(at(minute), format!("/m{minute}")))
            .await
            .expect("append");
    }

    let pages: Vec<String> = db
        .query_range(at(10), None)
        .await
        .expect("query")
        .into_iter()
        .map(|e| e.page)
        .collect();
    assert_eq!(pages, vec!["/m10", "/m100000"]);
}

#[tokio::test]
async fn engine_counts_events_stamped_in_the_future() {
    let db = Arc::new(DuckDbBackend::open_in_memory().expect("in-memory DuckDB"));
    let store: Arc<dyn EventStore> = db.clone();
    store
        .append_batch(&[
            Event::new(ago(5), "/").with_session("past"),
            Event::new(ago(-5), "/").with_session("skewed"),
        ])
        .await
        .expect("append batch");

    let engine = AnalyticsEngine::new(store);
    let since = ago(60);
    let total: i64 = engine
        .daily_rollup(since)
        .await
        .expect("rollup")
        .iter()
        .map(|d| d.event_count)
        .sum();
    assert_eq!(total, 2);
    assert_eq!(engine.list_sessions(since, 10).await.expect("sessions").len(), 2);
}

#[tokio::test]
async fn null_and_empty_optionals_round_trip() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let direct = Event::new(at(0), "/");
    let blank = Event::new(at(1), "/").with_session("").with_referrer("");
    db.append_batch(&[direct.clone(), blank.clone()])
        .await
        .expect("append batch");

    let events = db.query_range(at(0), Some(at(5))).await.expect("query");
    assert_eq!(events[0].session_id, None);
    assert_eq!(events[0].referrer, None);
    assert_eq!(events[1].session_id.as_deref(), Some(""));
    assert_eq!(events[1].session_key(), None);
}

#[tokio::test]
async fn failed_batch_stores_nothing() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let batch = vec![
        Event::new(at(0), "/"),
        Event::new(at(1), "/bad").with_duration(-5),
        Event::new(at(2), "/"),
    ];
    assert!(db.append_batch(&batch).await.is_err());
    assert!(db.query_range(at(-10), Some(at(10))).await.expect("query").is_empty());
}

#[tokio::test]
async fn totals_count_distinct_non_empty_sessions() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let empty = db.totals().await.expect("totals");
    assert_eq!(empty.total_events, 0);
    assert_eq!(empty.active_sessions, 0);
    assert_eq!(empty.avg_duration, 0.0);

    db.append_batch(&[
        Event::new(at(0), "/").with_session("a").with_duration(10),
        Event::new(at(1), "/").with_session("a").with_duration(20),
        Event::new(at(2), "/").with_session("b").with_duration(5),
        Event::new(at(3), "/").with_session("").with_duration(0),
    ])
    .await
    .expect("append batch");

    let totals = db.totals().await.expect("totals");
    assert_eq!(totals.total_events, 4);
    assert_eq!(totals.active_sessions, 2);
    assert_eq!(totals.avg_duration, 8.75);
}

#[tokio::test]
async fn reopening_a_database_file_keeps_events_and_schema() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("eventscope.db");
    let path = path.to_str().expect("utf-8 path");

    let event = Event::new(at(0), "/kept").with_session("s1");
    {
        let db = DuckDbBackend::open(path, "256MB").expect("open");
        db.append(&event).await.expect("append");
    }

    // Re-running the init SQL on an existing file must be a no-op.
    let db = DuckDbBackend::open(path, "256MB").expect("reopen");
    let events = db.query_range(at(-1), None).await.expect("query");
    assert_eq!(events, vec![event]);
    db.append(&Event::new(at(1), "/after")).await.expect("append after reopen");
}

#[tokio::test]
async fn ping_succeeds_on_open_database() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    db.ping().await.expect("ping");
}

#[tokio::test]
async fn engine_over_duckdb_reconstructs_sessions_and_funnels() {
    let db = Arc::new(DuckDbBackend::open_in_memory().expect("in-memory DuckDB"));
    let store: Arc<dyn EventStore> = db.clone();
    store
        .append_batch(&[
            Event::new(ago(50), "/").with_session("s1").with_duration(10),
            Event::new(ago(40), "/pricing").with_session("s1").with_duration(5),
            Event::new(ago(30), "/").with_session("s2"),
            Event::new(ago(20), "/signup").with_session("s3"),
            Event::new(ago(600), "/").with_session("stale"),
        ])
        .await
        .expect("append batch");

    let engine = AnalyticsEngine::new(store);
    let since = ago(60);

    let sessions = engine.list_sessions(since, 10).await.expect("sessions");
    assert_eq!(sessions.len(), 3);
    let s1 = sessions.iter().find(|s| s.session_id == "s1").expect("s1");
    assert_eq!(s1.page_count, 2);
    assert_eq!(s1.total_duration, 15);
    assert!(!s1.is_bounce);

    let steps = engine
        .funnel(
            &["/".to_string(), "/pricing".to_string(), "/signup".to_string()],
            since,
        )
        .await
        .expect("funnel");
    assert_eq!(steps[0].visitors, 2);
    assert_eq!(steps[0].conversion_rate, 100.0);
    assert_eq!(steps[1].conversion_rate, 50.0);
    assert_eq!(steps[2].visitors, 1);

    let total: i64 = engine
        .daily_rollup(since)
        .await
        .expect("rollup")
        .iter()
        .map(|d| d.event_count)
        .sum();
    assert_eq!(total, 4);

    let cohorts = engine
        .retention(7, ago(7 * 24 * 60), CohortAlignment::Window)
        .await
        .expect("retention");
    assert_eq!(cohorts.len(), 1);
    assert_eq!(cohorts[0].users, 4);
}
