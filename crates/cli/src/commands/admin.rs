//! Admin management commands.
//!
//! Admins added here are stored in the `admins` table and take effect on
//! the next command or notification, without restarting the bot. Chats in
//! `ADMIN_CHAT_ID` are admins regardless and are not listed.
//!
//! # Usage
//!
//! ```bash
//! ko-cli admin add 123456789
//! ko-cli admin remove 123456789
//! ko-cli admin list
//! ```
//!
//! # Environment Variables
//!
//! - `BOT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use krash_order_bot::config::{self, ConfigError};
use krash_order_bot::db::{self, PgStore, RepositoryError, Store};
use krash_order_core::UserId;
use thiserror::Error;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Not a Telegram user id.
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),
}

async fn connect() -> Result<PgStore, AdminError> {
    dotenvy::dotenv().ok();
    let database_url = config::database_url_from_env()?;
    tracing::info!("Connecting to database...");
    Ok(PgStore::new(db::create_pool(&database_url).await?))
}

fn parse_user_id(raw: &str) -> Result<UserId, AdminError> {
    raw.trim()
        .parse()
        .map_err(|_| AdminError::InvalidUserId(raw.to_owned()))
}

/// Grant admin rights to a Telegram user.
///
/// # Errors
///
/// Returns error if the id is invalid or the database write fails.
pub async fn add(user_id: &str) -> Result<(), AdminError> {
    let user_id = parse_user_id(user_id)?;
    let store = connect().await?;

    if store.add_admin(user_id).await? {
        tracing::info!("Admin added: {}", user_id);
    } else {
        tracing::warn!("User {} is already an admin", user_id);
    }
    Ok(())
}

/// Revoke admin rights from a Telegram user.
///
/// # Errors
///
/// Returns error if the id is invalid or the database write fails.
pub async fn remove(user_id: &str) -> Result<(), AdminError> {
    let user_id = parse_user_id(user_id)?;
    let store = connect().await?;

    if store.remove_admin(user_id).await? {
        tracing::info!("Admin removed: {}", user_id);
    } else {
        tracing::warn!("User {} is not a stored admin", user_id);
    }
    Ok(())
}

/// Log every stored admin.
///
/// # Errors
///
/// Returns error if the database read fails.
pub async fn list() -> Result<Vec<UserId>, AdminError> {
    let store = connect().await?;
    let admins = store.list_admins().await?;

    if admins.is_empty() {
        tracing::info!("No stored admins");
    }
    for user_id in &admins {
        tracing::info!("  {}", user_id);
    }
    Ok(admins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id(" 42 ").ok(), Some(UserId::new(42)));
        assert!(matches!(
            parse_user_id("abc"),
            Err(AdminError::InvalidUserId(_))
        ));
    }
}
