//! End-to-end checks against a running deployment.
//!
//! These need the service, its database and a reachable venue gateway, so
//! they are ignored by default: `BASE_URL=... SHOP_CODE=... cargo test -- --ignored`.

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Health {
    status: String,
    database: String,
}

#[derive(Debug, Deserialize)]
struct HourlyStat {
    hour: u32,
    record_count: i64,
}

#[derive(Debug, Deserialize)]
struct DailyStats {
    record_count: i64,
    avg_usage_rate: Option<f64>,
    max_usage_rate: Option<f64>,
    avg_used_devices: f64,
    max_used_devices: i32,
    total_devices: i32,
    hourly: Vec<HourlyStat>,
}

fn base_url() -> String {
    std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into())
}

fn shop_code() -> String {
    std::env::var("SHOP_CODE").unwrap_or_else(|_| "0437".into())
}

#[tokio::test]
#[ignore = "requires a running service at BASE_URL"]
async fn health_reports_database() -> Result<()> {
    // ---
    let url = format!("{}/health", base_url());
    let health: Health = Client::new().get(&url).send().await?.json().await?;

    assert_eq!(health.status, "ok");
    assert_eq!(health.database, "ok");
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running service at BASE_URL"]
async fn manual_poll_returns_report() -> Result<()> {
    // ---
    let url = format!("{}/shops/{}/poll", base_url(), shop_code());
    let resp = Client::new().post(&url).send().await?;
    assert_eq!(resp.status(), StatusCode::OK, "poll failed for {}", url);

    let text = resp.text().await?;
    assert!(text.starts_with("Shop: "), "unexpected report: {}", text);
    assert!(text.contains("\nAddress: "));
    assert!(!text.contains("NaN"));
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running service at BASE_URL"]
async fn daily_stats_are_consistent() -> Result<()> {
    // ---
    let client = Client::new();

    // Make sure today has at least one snapshot
    let poll = format!("{}/shops/{}/poll", base_url(), shop_code());
    client.post(&poll).send().await?.error_for_status()?;

    let today = chrono::Utc::now()
        .with_timezone(&chrono::FixedOffset::east_opt(8 * 3600).unwrap())
        .date_naive();
    let url = format!("{}/shops/{}/daily?date={}", base_url(), shop_code(), today);
    let resp = client.get(&url).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let stats: DailyStats = resp.json().await?;
    assert!(stats.record_count >= 1);
    assert!(stats.max_used_devices as f64 >= stats.avg_used_devices);
    assert!(stats.total_devices >= 0);
    if let (Some(avg), Some(max)) = (stats.avg_usage_rate, stats.max_usage_rate) {
        assert!(max >= avg);
        assert!((0.0..=100.0).contains(&max));
    }

    // hours with no data are omitted, not zero-filled
    assert!(stats.hourly.iter().all(|h| h.record_count > 0 && h.hour < 24));
    let per_hour: i64 = stats.hourly.iter().map(|h| h.record_count).sum();
    assert_eq!(per_hour, stats.record_count);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running service at BASE_URL"]
async fn unknown_shop_is_not_found() -> Result<()> {
    // ---
    let url = format!("{}/shops/no-such-shop/daily?date=2026-01-01", base_url());
    let resp = Client::new().get(&url).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}
