//! Client for the venue-management gateway.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::error::PollResult;
use crate::models::{ShopInfo, ShopInfoResponse};
use crate::Config;

// ---

/// Shared HTTP client with the configured timeout.
pub fn http_client(cfg: &Config) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(cfg.http_timeout_secs))
        .build()
}

/// Fetch name, address and open/closed status of a shop.
pub async fn fetch_shop_info(client: &Client, base_url: &str, code: &str) -> PollResult<ShopInfo> {
    // ---
    let url = format!(
        "{}/asset-svc/shop/store/portal/baseMessage",
        base_url.trim_end_matches('/')
    );
    debug!("Fetching shop info for {} from {}", code, url);

    let body = client
        .get(&url)
        .query(&[("commonCode", code)])
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let response: ShopInfoResponse = serde_json::from_str(&body)?;
    Ok(response.data)
}

/// Fetch the raw layout body; decoding is left to [`crate::parser::parse`].
pub async fn fetch_layout(client: &Client, base_url: &str, code: &str) -> PollResult<String> {
    // ---
    let url = format!(
        "{}/surf-internet/shop/v3/get",
        base_url.trim_end_matches('/')
    );
    debug!("Fetching layout for {} from {}", code, url);

    let body = client
        .post(&url)
        .json(&json!({ "commonCode": code }))
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    debug!("Layout for {}: {} bytes", code, body.len());
    Ok(body)
}
