// src/routes/health.rs
//! Liveness endpoint for the occupancy poller.
//!
//! `/health` answers as long as the process is serving HTTP and reports
//! whether the snapshot store is reachable, so a stalled database shows up
//! before the next poll run silently fails.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use reqwest::Client;
use serde::Serialize;
use sqlx::PgPool;

use crate::Config;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    shops: usize,
}

/// Handle `GET /health`.
///
/// Returns 200 with `database: "ok"` when a trivial query succeeds and
/// 503 with `database: "unreachable"` otherwise.
async fn health(
    State((pool, config, _)): State<(PgPool, Config, Client)>,
) -> (StatusCode, Json<HealthResponse>) {
    // ---
    let db_ok = sqlx::query("SELECT 1").execute(&pool).await.is_ok();
    let (code, status, database) = if db_ok {
        (StatusCode::OK, "ok", "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unreachable")
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            shops: config.shop_codes.len(),
        }),
    )
}

/// Subrouter containing the `/health` route.
pub fn router() -> Router<(PgPool, Config, Client)> {
    Router::new().route("/health", get(health))
}
