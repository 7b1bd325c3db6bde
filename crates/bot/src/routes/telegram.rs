//! Telegram webhook.
//!
//! Telegram retries a delivery until it gets a 2xx, so once an update is
//! authenticated and parsed the answer is always 200, whatever the handler
//! made of it.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use tracing::{debug, instrument, warn};

use crate::config::{WEBHOOK_PATH, secret_matches};
use crate::error::AppError;
use crate::handlers;
use crate::state::AppState;
use crate::telegram::{TelegramError, Update};

/// Header Telegram echoes the `setWebhook` secret in.
pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Create Telegram webhook routes.
pub fn router() -> Router<AppState> {
    Router::new().route(WEBHOOK_PATH, post(handle_update))
}

#[instrument(skip(state, headers, body))]
async fn handle_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    if let Some(expected) = &state.settings().webhook_secret {
        let presented = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !secret_matches(expected, presented) {
            warn!("Webhook call with a missing or wrong secret");
            return Err(AppError::Unauthorized(
                TelegramError::InvalidSecret.to_string(),
            ));
        }
    }

    let update: Update = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Failed to parse update: {e}")))?;
    debug!(update_id = update.update_id, "Update received");

    handlers::handle_update(&state, update).await;
    Ok(StatusCode::OK)
}
