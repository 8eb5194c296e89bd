//! Poll cycle and daily report jobs.
//!
//! Shops are processed one at a time. A failure in one shop is logged and
//! reported but never stops the remaining shops.

use std::future::Future;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, Timelike, Utc};
use reqwest::Client;
use sqlx::PgPool;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{PollError, PollResult};
use crate::writer::{self, SnapshotPlan};
use crate::{db, notify, parser, report, rollup, venue, Config};

// ---

/// Outcome of one shop's poll: the report text and the shop's display name.
#[derive(Debug)]
pub struct PollOutcome {
    pub shop_name: String,
    pub report: String,
}

/// Run one poll cycle for a single shop and persist its snapshot.
pub async fn poll_shop(
    pool: &PgPool,
    client: &Client,
    cfg: &Config,
    code: &str,
) -> PollResult<PollOutcome> {
    // ---
    let info = venue::fetch_shop_info(client, &cfg.venue_api_url, code).await?;
    let shop = db::upsert_shop(pool, code, &info).await?;
    let captured_at = Utc::now();

    if !info.is_operating() {
        info!(shop = %shop.name, status = %info.shop_status, "Shop not operating");
        let plan = SnapshotPlan::closed(shop.id, captured_at, &info.shop_status);
        writer::persist(pool, &plan).await?;
        return Ok(PollOutcome {
            report: report::closed_report(&shop, &info.shop_status),
            shop_name: shop.name,
        });
    }

    let body = venue::fetch_layout(client, &cfg.venue_api_url, code).await?;
    let parsed = parser::parse(&body)?;

    let plan = SnapshotPlan::build(shop.id, captured_at, &info.shop_status, &parsed);
    writer::persist(pool, &plan).await?;

    Ok(PollOutcome {
        report: report::live_report(&shop, &parsed.shop),
        shop_name: shop.name,
    })
}

/// Run `job` for each code in order and collect every result.
///
/// An `Err` from one code is kept and the next code still runs.
pub async fn run_each<T, F, Fut>(codes: &[String], mut job: F) -> Vec<(String, PollResult<T>)>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = PollResult<T>>,
{
    // ---
    let mut results = Vec::with_capacity(codes.len());
    for code in codes {
        let result = job(code.clone()).instrument(info_span!("shop", %code)).await;
        results.push((code.clone(), result));
    }
    results
}

/// Poll every configured shop in order and push the results.
pub async fn poll_all(pool: &PgPool, client: &Client, cfg: &Config) {
    // ---
    let run_id = Uuid::new_v4();
    let span = info_span!("poll_run", %run_id);

    async {
        info!("Polling {} shop(s)", cfg.shop_codes.len());
        let results = run_each(&cfg.shop_codes, |code| async move {
            poll_shop(pool, client, cfg, &code).await
        })
        .await;

        for (code, result) in results {
            let (message, group) = match result {
                Ok(outcome) => {
                    info!("Poll complete for {}", outcome.shop_name);
                    (outcome.report, outcome.shop_name)
                }
                Err(e) => {
                    error!("Poll failed for {}: {}", code, e);
                    (format!("Failed to fetch status for {}: {}", code, e), code)
                }
            };
            notify::send_all(client, &cfg.bark_base_url, &cfg.bark_tokens, &message, &group).await;
        }
    }
    .instrument(span)
    .await
}

// ---

/// A rendered daily rollup for one shop.
#[derive(Debug)]
pub struct DailyOutcome {
    pub shop_name: String,
    pub report: String,
    pub stats: rollup::DailyStats,
}

/// Roll up one local day for a shop and render it.
///
/// `Ok(None)` when the shop has no snapshots that day.
pub async fn daily_report(
    pool: &PgPool,
    code: &str,
    date: NaiveDate,
    offset: FixedOffset,
) -> PollResult<Option<DailyOutcome>> {
    // ---
    let shop = db::find_shop(pool, code)
        .await?
        .ok_or_else(|| PollError::UnknownShop(code.to_string()))?;

    let (start, end) = rollup::day_window(date, offset);
    let Some(stats) = rollup::rollup(pool, shop.id, start, end, offset).await? else {
        return Ok(None);
    };

    Ok(Some(DailyOutcome {
        report: report::daily_report(&shop.name, &stats),
        shop_name: shop.name,
        stats,
    }))
}

/// Push yesterday's report for every configured shop.
pub async fn daily_all(pool: &PgPool, client: &Client, cfg: &Config) {
    // ---
    let offset = cfg.local_offset;
    let date = rollup::yesterday(Utc::now(), offset);
    info!("Generating daily reports for {}", date);

    let results = run_each(&cfg.shop_codes, |code| async move {
        daily_report(pool, &code, date, offset).await
    })
    .await;

    for (code, result) in results {
        match result {
            Ok(Some(outcome)) => {
                notify::send_all(
                    client,
                    &cfg.bark_base_url,
                    &cfg.bark_tokens,
                    &outcome.report,
                    &outcome.shop_name,
                )
                .await;
            }
            Ok(None) => info!("No snapshots for {} on {}, skipping report", code, date),
            Err(e) => error!("Daily report failed for {}: {}", code, e),
        }
    }
}

/// Time to wait from `now` until the next `hour:00` in local time.
pub fn until_next_hour(now: DateTime<Utc>, hour: u32, offset: FixedOffset) -> TimeDelta {
    // ---
    let local = now.with_timezone(&offset);
    let today_at = local
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .map(|t| t - TimeDelta::seconds(i64::from(offset.local_minus_utc())))
        .map(|t| t.and_utc());

    match today_at {
        Some(at) if at > now => at - now,
        Some(at) => at + TimeDelta::days(1) - now,
        None => {
            warn!("Invalid report hour {}, retrying in an hour", hour);
            TimeDelta::seconds(i64::from(3600 - local.minute() * 60 - local.second()))
        }
    }
}
