use axum::Router;
use reqwest::Client;
use sqlx::PgPool;

use crate::Config;

mod health;
mod shops;

// ---

pub fn router(pool: PgPool, config: Config, client: Client) -> Router {
    // ---
    Router::new()
        .merge(shops::router())
        .merge(health::router())
        .with_state((pool, config, client))
}
