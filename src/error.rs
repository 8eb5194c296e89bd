//! Error taxonomy for a single shop's poll or report cycle.
//!
//! Every variant is contained to the shop that raised it; the poller logs it,
//! pushes an error notification and moves on to the next shop.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PollError {
    /// Network failure or non-success status from a remote endpoint.
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Payload did not have the expected shape, or the remote reported an error.
    #[error("unexpected payload: {0}")]
    Parse(String),

    /// Database write or query failure. Open transactions are rolled back.
    #[error("persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("unknown shop: {0}")]
    UnknownShop(String),
}

impl From<serde_json::Error> for PollError {
    fn from(e: serde_json::Error) -> Self {
        PollError::Parse(e.to_string())
    }
}

pub type PollResult<T> = Result<T, PollError>;

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let status = match &self {
            PollError::UnknownShop(_) => StatusCode::NOT_FOUND,
            PollError::Fetch(_) | PollError::Parse(_) => StatusCode::BAD_GATEWAY,
            PollError::Persistence(e) => {
                tracing::error!("Database error: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
