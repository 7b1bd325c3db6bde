//! Webhook registration.
//!
//! The bot registers its webhook at startup when `WEBHOOK_URL` is set; this
//! command does the same without starting the server, e.g. after rotating
//! `WEBHOOK_SECRET`.
//!
//! # Usage
//!
//! ```bash
//! ko-cli webhook set
//! ko-cli webhook set --drop-pending
//! ```
//!
//! # Environment Variables
//!
//! - `TELEGRAM_BOT_TOKEN` - Bot API token
//! - `WEBHOOK_URL` - Public base URL of the bot
//! - `WEBHOOK_SECRET` - Optional shared secret

use krash_order_bot::config::{ConfigError, TelegramConfig};
use krash_order_bot::telegram::{TelegramClient, TelegramError};
use thiserror::Error;

/// Errors that can occur while registering the webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("WEBHOOK_URL is not set")]
    MissingUrl,

    #[error("Telegram error: {0}")]
    Telegram(#[from] TelegramError),
}

/// Point Telegram at `WEBHOOK_URL`.
///
/// # Errors
///
/// Returns error if configuration is incomplete or Telegram rejects the URL.
pub async fn set(drop_pending_updates: bool) -> Result<(), WebhookError> {
    dotenvy::dotenv().ok();
    let config = TelegramConfig::from_env()?;
    let endpoint = config.webhook_endpoint().ok_or(WebhookError::MissingUrl)?;

    let client = TelegramClient::from_config(&config);
    client
        .set_webhook(
            &endpoint,
            config.webhook_secret.as_ref(),
            drop_pending_updates,
        )
        .await?;

    tracing::info!("Webhook registered: {}", endpoint);
    Ok(())
}
