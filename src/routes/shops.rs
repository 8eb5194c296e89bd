//! Per-shop endpoints: manual poll and daily statistics.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};

use crate::error::PollError;
use crate::{poller, rollup, Config};

// ---

pub fn router() -> Router<(PgPool, Config, Client)> {
    // ---
    Router::new()
        .route("/shops/{code}/poll", post(poll_handler))
        .route("/shops/{code}/daily", get(daily_handler))
}

/// Run one poll cycle now and return the rendered report.
async fn poll_handler(
    Path(code): Path<String>,
    State((pool, config, client)): State<(PgPool, Config, Client)>,
) -> Result<String, PollError> {
    // ---
    info!("POST /shops/{}/poll", code);
    let outcome = poller::poll_shop(&pool, &client, &config, &code)
        .await
        .inspect_err(|e| error!("Manual poll failed for {}: {}", code, e))?;
    Ok(outcome.report)
}

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    /// Local date, `YYYY-MM-DD`; defaults to yesterday.
    date: Option<NaiveDate>,
}

/// Daily rollup as JSON; 204 when the day has no snapshots.
async fn daily_handler(
    Path(code): Path<String>,
    Query(params): Query<DailyQuery>,
    State((pool, config, _)): State<(PgPool, Config, Client)>,
) -> Result<impl IntoResponse, PollError> {
    // ---
    let offset = config.local_offset;
    let date = params
        .date
        .unwrap_or_else(|| rollup::yesterday(Utc::now(), offset));
    info!("GET /shops/{}/daily - {}", code, date);

    let response = match poller::daily_report(&pool, &code, date, offset).await? {
        Some(outcome) => (StatusCode::OK, Json(outcome.stats)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    Ok(response)
}
