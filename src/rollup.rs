//! Rollup aggregator: stored snapshots over a window → daily statistics.
//!
//! Averages follow SQL `AVG` semantics: snapshots with an undefined rate
//! (closed shop, no devices) are skipped for the rate figures but still count
//! towards the record and device figures.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Timelike, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::debug;

use crate::db;
use crate::error::PollResult;
use crate::models::Snapshot;

// ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyStat {
    // ---
    /// Local hour of day, 0-23.
    pub hour: u32,
    pub record_count: i64,
    pub avg_usage_rate: Option<f64>,
    pub avg_used_devices: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    // ---
    pub record_count: i64,
    pub avg_usage_rate: Option<f64>,
    pub max_usage_rate: Option<f64>,
    pub avg_used_devices: f64,
    pub max_used_devices: i32,
    /// Taken from the latest snapshot in the window.
    pub total_devices: i32,
    /// Only hours that had at least one snapshot, ascending.
    pub hourly: Vec<HourlyStat>,
}

/// Roll up every snapshot of `shop_id` captured in `[start, end)`.
///
/// `Ok(None)` means the window holds no data.
pub async fn rollup(
    pool: &PgPool,
    shop_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    offset: FixedOffset,
) -> PollResult<Option<DailyStats>> {
    // ---
    let rows = db::snapshots_in_window(pool, shop_id, start, end).await?;
    debug!(shop_id, rows = rows.len(), %start, %end, "Rolling up snapshots");
    Ok(summarize(&rows, offset))
}

/// Aggregate snapshots already restricted to one window.
pub fn summarize(rows: &[Snapshot], offset: FixedOffset) -> Option<DailyStats> {
    // ---
    let latest = rows.iter().max_by_key(|s| s.captured_at)?;

    let overall = Accumulator::over(rows.iter());

    let mut by_hour: BTreeMap<u32, Accumulator> = BTreeMap::new();
    for row in rows {
        let hour = row.captured_at.with_timezone(&offset).hour();
        by_hour.entry(hour).or_default().push(row);
    }

    let hourly = by_hour
        .into_iter()
        .map(|(hour, acc)| HourlyStat {
            hour,
            record_count: acc.count,
            avg_usage_rate: acc.avg_rate(),
            avg_used_devices: acc.avg_used(),
        })
        .collect();

    Some(DailyStats {
        record_count: overall.count,
        avg_usage_rate: overall.avg_rate(),
        max_usage_rate: overall.max_rate,
        avg_used_devices: overall.avg_used(),
        max_used_devices: overall.max_used,
        total_devices: latest.total_devices,
        hourly,
    })
}

#[derive(Debug, Default)]
struct Accumulator {
    count: i64,
    rate_sum: f64,
    rate_count: i64,
    max_rate: Option<f64>,
    used_sum: i64,
    max_used: i32,
}

impl Accumulator {
    fn over<'a>(rows: impl Iterator<Item = &'a Snapshot>) -> Self {
        let mut acc = Self::default();
        rows.for_each(|r| acc.push(r));
        acc
    }

    fn push(&mut self, row: &Snapshot) {
        self.count += 1;
        self.used_sum += i64::from(row.used_devices);
        self.max_used = self.max_used.max(row.used_devices);
        if let Some(rate) = row.usage_rate {
            self.rate_sum += rate;
            self.rate_count += 1;
            self.max_rate = Some(self.max_rate.map_or(rate, |m| m.max(rate)));
        }
    }

    fn avg_rate(&self) -> Option<f64> {
        (self.rate_count > 0).then(|| self.rate_sum / self.rate_count as f64)
    }

    fn avg_used(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.used_sum as f64 / self.count as f64
    }
}

// --- windows

/// UTC bounds of the local calendar day `date`.
pub fn day_window(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    // ---
    let local_midnight = date.and_time(NaiveTime::MIN);
    let start = (local_midnight - TimeDelta::seconds(i64::from(offset.local_minus_utc()))).and_utc();
    (start, start + TimeDelta::days(1))
}

/// The local calendar day before the one containing `now`.
pub fn yesterday(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    let today = now.with_timezone(&offset).date_naive();
    today.pred_opt().unwrap_or(today)
}
