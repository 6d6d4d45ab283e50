//! Aggregations over a window of events.
//!
//! Every function here is a pure single pass (plus a final sort) over events
//! the caller has already restricted to the query window. None of them fail
//! on empty input; malformed arguments are rejected before any work is done.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{
    classify_os, classify_source, classify_user_agent, Browser, DeviceType, Os, Source,
};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::event::Event;

const COHORT_DAYS: i64 = 7;
const TOP_REFERRERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRollup {
    pub day: NaiveDate,
    pub event_count: i64,
    pub distinct_session_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyBucket {
    pub hour: u32,
    pub event_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageViews {
    pub page: String,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStep {
    /// 1-based position in the funnel.
    pub step: usize,
    pub page: String,
    pub visitors: i64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionCohort {
    pub period: usize,
    pub cohort_start: DateTime<Utc>,
    pub cohort_end: DateTime<Utc>,
    pub users: i64,
    pub retained_users: i64,
    pub retention_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferrerCount {
    pub referrer: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMetric {
    pub page: String,
    pub views: i64,
    pub unique_visitors: i64,
    pub avg_duration: f64,
    /// Share of this page's sessions that had exactly one event in the whole
    /// window, 0–100.
    pub bounce_rate: f64,
    pub top_referrers: Vec<ReferrerCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSourceRow {
    pub source: Source,
    pub visits: i64,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRow {
    pub device: DeviceType,
    pub browser: Browser,
    pub os: Os,
    pub visits: i64,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventBucket {
    pub bucket: DateTime<Utc>,
    pub page: String,
    pub os: Os,
    pub count: i64,
    pub avg_duration: f64,
}

/// Whole-table counters for the realtime dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSummary {
    pub total_events: i64,
    pub active_sessions: i64,
    pub avg_duration: f64,
}

/// Where retention cohort buckets start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CohortAlignment {
    /// Consecutive 7-day buckets starting exactly at `since`.
    #[default]
    Window,
    /// Buckets break on Monday 00:00 UTC; the first bucket runs from `since`
    /// to the next Monday.
    CalendarWeek,
}

impl CohortAlignment {
    pub fn parse(raw: Option<&str>) -> AnalyticsResult<Self> {
        match raw.map(str::trim) {
            None | Some("") | Some("window") => Ok(Self::Window),
            Some("calendar_week") => Ok(Self::CalendarWeek),
            Some(_) => Err(AnalyticsError::invalid(
                "alignment must be one of: window, calendar_week",
            )),
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn checked_limit(limit: i64) -> AnalyticsResult<usize> {
    usize::try_from(limit).map_err(|_| AnalyticsError::invalid("limit must not be negative"))
}

fn pct(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

fn avg(sum: i64, count: i64) -> f64 {
    if count == 0 {
        0.0
    } else {
        round2(sum as f64 / count as f64)
    }
}

/// Events and distinct sessions per UTC calendar day, oldest day first.
pub fn daily_rollup(events: &[Event]) -> Vec<DailyRollup> {
    let mut days: BTreeMap<NaiveDate, (i64, HashSet<&str>)> = BTreeMap::new();
    for event in events {
        let entry = days.entry(event.time.date_naive()).or_default();
        entry.0 += 1;
        if let Some(session_id) = event.session_key() {
            entry.1.insert(session_id);
        }
    }
    days.into_iter()
        .map(|(day, (event_count, sessions))| DailyRollup {
            day,
            event_count,
            distinct_session_count: sessions.len() as i64,
        })
        .collect()
}

/// Event counts by hour of day (UTC), all 24 hours present.
pub fn hourly_histogram(events: &[Event]) -> Vec<HourlyBucket> {
    let mut counts = [0i64; 24];
    for event in events {
        counts[event.time.hour() as usize] += 1;
    }
    counts
        .iter()
        .enumerate()
        .map(|(hour, &event_count)| HourlyBucket {
            hour: hour as u32,
            event_count,
        })
        .collect()
}

pub fn top_pages(events: &[Event], limit: i64) -> AnalyticsResult<Vec<PageViews>> {
    let limit = checked_limit(limit)?;
    let mut views: HashMap<&str, i64> = HashMap::new();
    for event in events {
        *views.entry(event.page.as_str()).or_default() += 1;
    }
    let mut rows: Vec<PageViews> = views
        .into_iter()
        .map(|(page, views)| PageViews {
            page: page.to_string(),
            views,
        })
        .collect();
    rows.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.page.cmp(&b.page)));
    rows.truncate(limit);
    Ok(rows)
}

/// Distinct sessions per funnel page.
///
/// Steps are counted independently: a session that only ever saw step 3
/// still counts toward step 3. Rates are relative to the first step.
pub fn funnel(events: &[Event], pages: &[String]) -> Vec<FunnelStep> {
    if pages.is_empty() {
        return Vec::new();
    }
    let wanted: HashSet<&str> = pages.iter().map(String::as_str).collect();
    let mut visitors: HashMap<&str, HashSet<&str>> = HashMap::new();
    for event in events {
        let page = event.page.as_str();
        if !wanted.contains(page) {
            continue;
        }
        if let Some(session_id) = event.session_key() {
            visitors.entry(page).or_default().insert(session_id);
        }
    }

    let counts: Vec<i64> = pages
        .iter()
        .map(|page| {
            visitors
                .get(page.as_str())
                .map_or(0, |sessions| sessions.len() as i64)
        })
        .collect();
    let entry_visitors = counts[0];

    pages
        .iter()
        .zip(counts)
        .enumerate()
        .map(|(idx, (page, visitors))| FunnelStep {
            step: idx + 1,
            page: page.clone(),
            visitors,
            conversion_rate: pct(visitors, entry_visitors),
        })
        .collect()
}

/// Bucket boundaries for a retention query over `[since, since + days)`.
pub fn cohort_bounds(
    since: DateTime<Utc>,
    days: i64,
    alignment: CohortAlignment,
) -> AnalyticsResult<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
    if days < 0 {
        return Err(AnalyticsError::invalid("days must not be negative"));
    }
    let window_end = Duration::try_days(days)
        .and_then(|span| since.checked_add_signed(span))
        .ok_or_else(|| AnalyticsError::invalid("days is out of range"))?;
    let week = Duration::days(COHORT_DAYS);
    // Bucket ends past the representable range collapse onto `window_end`.
    let clamp = |end: Option<DateTime<Utc>>| end.map_or(window_end, |end| end.min(window_end));

    let mut bounds = Vec::new();
    let mut start = since;
    let mut end = clamp(match alignment {
        CohortAlignment::Window => since.checked_add_signed(week),
        CohortAlignment::CalendarWeek => next_monday(since),
    });
    while start < window_end {
        bounds.push((start, end));
        start = end;
        end = clamp(end.checked_add_signed(week));
    }
    Ok(bounds)
}

/// Midnight UTC of the first Monday strictly after `at`, if representable.
fn next_monday(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let date = at.date_naive();
    let days_ahead = COHORT_DAYS - i64::from(date.weekday().num_days_from_monday());
    let monday = date.checked_add_signed(Duration::days(days_ahead))?;
    Some(Utc.from_utc_datetime(&monday.and_time(chrono::NaiveTime::MIN)))
}

/// Weekly retention cohorts.
///
/// A session belongs to every bucket it has an event in, and is retained for
/// a bucket when it has any event at or after that bucket's end. Events after
/// the analysed window still count as returns.
pub fn retention(
    events: &[Event],
    since: DateTime<Utc>,
    days: i64,
    alignment: CohortAlignment,
) -> AnalyticsResult<Vec<RetentionCohort>> {
    let bounds = cohort_bounds(since, days, alignment)?;
    if bounds.is_empty() {
        return Ok(Vec::new());
    }

    let mut sessions: HashMap<&str, (Vec<bool>, DateTime<Utc>)> = HashMap::new();
    for event in events {
        let Some(session_id) = event.session_key() else {
            continue;
        };
        let entry = sessions
            .entry(session_id)
            .or_insert_with(|| (vec![false; bounds.len()], event.time));
        if event.time > entry.1 {
            entry.1 = event.time;
        }
        // Index of the last bucket starting at or before the event.
        let idx = bounds.partition_point(|(start, _)| *start <= event.time);
        if idx > 0 && event.time < bounds[idx - 1].1 {
            entry.0[idx - 1] = true;
        }
    }

    let mut users = vec![0i64; bounds.len()];
    let mut retained = vec![0i64; bounds.len()];
    for (buckets, last_seen) in sessions.values() {
        for (idx, present) in buckets.iter().enumerate() {
            if !present {
                continue;
            }
            users[idx] += 1;
            if *last_seen >= bounds[idx].1 {
                retained[idx] += 1;
            }
        }
    }

    Ok(bounds
        .into_iter()
        .enumerate()
        .map(|(period, (cohort_start, cohort_end))| RetentionCohort {
            period,
            cohort_start,
            cohort_end,
            users: users[period],
            retained_users: retained[period],
            retention_rate: pct(retained[period], users[period]),
        })
        .collect())
}

#[derive(Default)]
struct PageAcc<'a> {
    views: i64,
    duration: i64,
    sessions: HashSet<&'a str>,
    referrers: HashMap<&'a str, i64>,
}

pub fn page_metrics(events: &[Event], limit: i64) -> AnalyticsResult<Vec<PageMetric>> {
    let limit = checked_limit(limit)?;

    let mut session_events: HashMap<&str, i64> = HashMap::new();
    let mut pages: HashMap<&str, PageAcc<'_>> = HashMap::new();
    for event in events {
        let acc = pages.entry(event.page.as_str()).or_default();
        acc.views += 1;
        acc.duration += event.duration;
        if let Some(session_id) = event.session_key() {
            acc.sessions.insert(session_id);
            *session_events.entry(session_id).or_default() += 1;
        }
        if let Some(referrer) = event.referrer_key() {
            *acc.referrers.entry(referrer).or_default() += 1;
        }
    }

    let mut rows: Vec<PageMetric> = pages
        .into_iter()
        .map(|(page, acc)| {
            let unique_visitors = acc.sessions.len() as i64;
            let bounced = acc
                .sessions
                .iter()
                .filter(|id| session_events.get(*id) == Some(&1))
                .count() as i64;
            let mut top_referrers: Vec<ReferrerCount> = acc
                .referrers
                .into_iter()
                .map(|(referrer, count)| ReferrerCount {
                    referrer: referrer.to_string(),
                    count,
                })
                .collect();
            top_referrers.sort_by(|a, b| {
                b.count
                    .cmp(&a.count)
                    .then_with(|| a.referrer.cmp(&b.referrer))
            });
            top_referrers.truncate(TOP_REFERRERS);
            PageMetric {
                page: page.to_string(),
                views: acc.views,
                unique_visitors,
                avg_duration: avg(acc.duration, acc.views),
                bounce_rate: pct(bounced, unique_visitors),
                top_referrers,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.page.cmp(&b.page)));
    rows.truncate(limit);
    Ok(rows)
}

pub fn traffic_sources(events: &[Event]) -> Vec<TrafficSourceRow> {
    let mut visits: HashMap<Source, i64> = HashMap::new();
    for event in events {
        *visits.entry(classify_source(event.referrer_key())).or_default() += 1;
    }
    let total = events.len() as i64;
    let mut rows: Vec<TrafficSourceRow> = visits
        .into_iter()
        .map(|(source, visits)| TrafficSourceRow {
            source,
            visits,
            pct: pct(visits, total),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.visits
            .cmp(&a.visits)
            .then_with(|| a.source.label().cmp(b.source.label()))
    });
    rows
}

pub fn device_breakdown(events: &[Event]) -> Vec<DeviceRow> {
    let mut visits = HashMap::new();
    for event in events {
        *visits
            .entry(classify_user_agent(&event.user_agent))
            .or_insert(0i64) += 1;
    }
    let total = events.len() as i64;
    let mut rows: Vec<DeviceRow> = visits
        .into_iter()
        .map(|(client, visits)| DeviceRow {
            device: client.device,
            browser: client.browser,
            os: client.os,
            visits,
            pct: pct(visits, total),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.visits.cmp(&a.visits).then_with(|| {
            (a.device.label(), a.browser.label(), a.os.label()).cmp(&(
                b.device.label(),
                b.browser.label(),
                b.os.label(),
            ))
        })
    });
    rows
}

/// Events grouped by epoch-aligned time bucket, page and OS.
///
/// Newest bucket first; within a bucket, page then OS label ascending.
pub fn event_buckets(
    events: &[Event],
    bucket_minutes: i64,
    pages: Option<&[String]>,
) -> AnalyticsResult<Vec<EventBucket>> {
    if bucket_minutes <= 0 {
        return Err(AnalyticsError::invalid("bucket_minutes must be positive"));
    }
    let width = bucket_minutes
        .checked_mul(60)
        .ok_or_else(|| AnalyticsError::invalid("bucket_minutes is out of range"))?;
    let wanted: Option<HashSet<&str>> =
        pages.map(|pages| pages.iter().map(String::as_str).collect());

    let mut groups: HashMap<(i64, &str, Os), (i64, i64)> = HashMap::new();
    for event in events {
        if let Some(wanted) = &wanted {
            if !wanted.contains(event.page.as_str()) {
                continue;
            }
        }
        let bucket = event.time.timestamp().div_euclid(width) * width;
        let entry = groups
            .entry((bucket, event.page.as_str(), classify_os(&event.user_agent)))
            .or_default();
        entry.0 += 1;
        entry.1 += event.duration;
    }

    let mut rows = Vec::with_capacity(groups.len());
    for ((bucket, page, os), (count, duration)) in groups {
        let bucket = DateTime::<Utc>::from_timestamp(bucket, 0)
            .ok_or_else(|| AnalyticsError::invalid("event time out of range"))?;
        rows.push(EventBucket {
            bucket,
            page: page.to_string(),
            os,
            count,
            avg_duration: avg(duration, count),
        });
    }
    rows.sort_by(|a, b| {
        b.bucket
            .cmp(&a.bucket)
            .then_with(|| a.page.cmp(&b.page))
            .then_with(|| a.os.label().cmp(b.os.label()))
    });
    Ok(rows)
}
