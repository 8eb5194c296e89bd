//! Bark push notifications, fire-and-forget per token.

use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

// ---

#[derive(Debug, Serialize)]
struct BarkMessage<'a> {
    title: &'a str,
    body: &'a str,
    group: &'a str,
}

/// Push `body` to every token; failures are logged and swallowed.
pub async fn send_all(client: &Client, base_url: &str, tokens: &[String], body: &str, group: &str) {
    // ---
    if tokens.is_empty() {
        info!("No Bark tokens configured. Skipping notification.");
        return;
    }

    for token in tokens {
        let url = endpoint(base_url, token);
        let message = BarkMessage {
            title: group,
            body,
            group,
        };

        let result = client
            .post(&url)
            .json(&message)
            .send()
            .await
            .and_then(|resp| resp.error_for_status());

        match result {
            Ok(_) => info!("Bark notification sent for {}", group),
            Err(e) => warn!(
                "Failed to send Bark notification to token ending in ...{} for {}: {}",
                tail(token),
                group,
                e
            ),
        }
    }
}

/// Full URL for a token; tokens may be bare keys or complete URLs.
fn endpoint(base_url: &str, token: &str) -> String {
    // ---
    if token.contains("://") {
        token.trim_end_matches('/').to_string()
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), token)
    }
}

fn tail(token: &str) -> &str {
    let start = token
        .char_indices()
        .rev()
        .nth(3)
        .map_or(0, |(i, _)| i);
    &token[start..]
}
