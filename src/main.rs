//! Application entry point for the `wywk-occupancy` service.
//!
//! This binary orchestrates the full startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool
//! - Creating the database schema if it does not exist
//! - Spawning the polling loop and the daily report job
//! - Binding the Axum HTTP server (health, manual poll, daily stats)
//!
//! # Environment Variables
//! - `DATABASE_URL`, `VENUE_API_URL`, `SHOP_CODES` (**required**)
//! - see [`config::load_from_env`] for the optional ones
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! Schema setup lives in `schema`, configuration parsing in `config`, and
//! route registration in `routes`; this file only wires them together.
use std::{env, io::IsTerminal, time::Duration};

use axum::Router;
use dotenvy::dotenv;
use reqwest::Client;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

mod config;
mod db;
mod error;
mod models;
mod notify;
mod parser;
mod poller;
mod report;
mod rollup;
mod routes;
mod schema;
mod venue;
mod writer;

pub use config::Config;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    let client = venue::http_client(&cfg)?;

    tokio::spawn(poll_loop(pool.clone(), client.clone(), cfg.clone()));
    tokio::spawn(daily_loop(pool.clone(), client.clone(), cfg.clone()));

    let app: Router = routes::router(pool, cfg.clone(), client);

    tracing::info!("Listening on {}", cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Poll every shop on a fixed interval; the first run starts immediately.
async fn poll_loop(pool: PgPool, client: Client, cfg: Config) {
    // ---
    let mut interval = tokio::time::interval(Duration::from_secs(cfg.poll_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        poller::poll_all(&pool, &client, &cfg).await;
    }
}

/// Send yesterday's reports once a day at `DAILY_REPORT_HOUR` local time.
async fn daily_loop(pool: PgPool, client: Client, cfg: Config) {
    // ---
    loop {
        let wait = poller::until_next_hour(
            chrono::Utc::now(),
            cfg.daily_report_hour,
            cfg.local_offset,
        );
        tracing::info!("Next daily report in {} minutes", wait.num_minutes());
        tokio::time::sleep(wait.to_std().unwrap_or(Duration::from_secs(60))).await;

        poller::daily_all(&pool, &client, &cfg).await;
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `AXUM_LOG_LEVEL` picks the level
/// (default `debug`) with sqlx statements and HTTP client internals kept
/// quieter. `AXUM_SPAN_EVENTS=full|enter_exit` surfaces the poll-run and
/// per-shop spans; `FORCE_COLOR` overrides TTY colour detection.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to AXUM_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
