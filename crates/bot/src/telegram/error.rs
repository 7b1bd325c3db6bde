//! Telegram-related errors.

use thiserror::Error;

/// Errors that can occur when talking to the Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// HTTP request failed.
    #[error("Telegram request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("Telegram response error: {0}")]
    Response(String),

    /// The Bot API answered with `ok: false`.
    #[error("Telegram API error {code}: {description}")]
    Api {
        /// `error_code` from the response.
        code: i32,
        /// Human readable `description` from the response.
        description: String,
    },

    /// Webhook request did not carry the configured secret.
    #[error("Invalid webhook secret")]
    InvalidSecret,
}

impl TelegramError {
    /// Editing a message to identical content is rejected by Telegram; the
    /// visible state is already what was requested.
    #[must_use]
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::Api { description, .. } if description.contains("message is not modified"))
    }
}
