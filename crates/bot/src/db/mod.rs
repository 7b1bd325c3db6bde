//! Persistence for clients, admins and the order ledger.
//!
//! # Tables
//!
//! - `clients` - Registered organizations keyed by Telegram user id
//! - `admins` - Staff added at runtime (config admins are not stored)
//! - `orders` - The order ledger; `order_data` is a JSONB snapshot
//!
//! # Migrations
//!
//! Migrations are stored in `crates/bot/migrations/` and run via:
//! ```bash
//! cargo run -p krash-order-cli -- migrate
//! ```
//! or at bot startup when `BOT_RUN_MIGRATIONS=true`.

pub mod admins;
pub mod clients;
pub mod memory;
pub mod orders;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use krash_order_core::{ClientProfile, NewOrder, Order, OrderId, UserId};

pub use admins::AdminRepository;
pub use clients::ClientRepository;
pub use memory::MemoryStore;
pub use orders::OrderRepository;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Every persistence operation the bot needs.
///
/// Each method is a single atomic statement, so a failure never leaves a
/// partial write behind.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_client(&self, user_id: UserId) -> Result<Option<ClientProfile>, RepositoryError>;

    /// Insert or overwrite the profile for `profile.user_id`.
    async fn upsert_client(&self, profile: &ClientProfile) -> Result<(), RepositoryError>;

    /// Append an order to the ledger, returning its assigned id.
    async fn save_order(&self, order: &NewOrder) -> Result<OrderId, RepositoryError>;

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Move an order from `active` to `cancelled`.
    ///
    /// Returns `false` when no active order with that id exists; a second
    /// cancel of the same order always returns `false`.
    async fn cancel_order(&self, order_id: OrderId) -> Result<bool, RepositoryError>;

    /// The most recently created active order for a user.
    async fn get_active_order(&self, user_id: UserId) -> Result<Option<Order>, RepositoryError>;

    /// All orders, in any status, with a delivery date in `[start, end]`.
    async fn orders_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Order>, RepositoryError>;

    async fn is_admin(&self, user_id: UserId) -> Result<bool, RepositoryError>;

    /// Returns `false` if the user was already an admin.
    async fn add_admin(&self, user_id: UserId) -> Result<bool, RepositoryError>;

    /// Returns `false` if the user was not an admin.
    async fn remove_admin(&self, user_id: UserId) -> Result<bool, RepositoryError>;

    async fn list_admins(&self) -> Result<Vec<UserId>, RepositoryError>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// [`Store`] backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_client(&self, user_id: UserId) -> Result<Option<ClientProfile>, RepositoryError> {
        ClientRepository::new(&self.pool).get(user_id).await
    }

    async fn upsert_client(&self, profile: &ClientProfile) -> Result<(), RepositoryError> {
        ClientRepository::new(&self.pool).upsert(profile).await
    }

    async fn save_order(&self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        OrderRepository::new(&self.pool).insert(order).await
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).get(order_id).await
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<bool, RepositoryError> {
        OrderRepository::new(&self.pool).cancel(order_id).await
    }

    async fn get_active_order(&self, user_id: UserId) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).latest_active(user_id).await
    }

    async fn orders_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).in_range(start, end).await
    }

    async fn is_admin(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        AdminRepository::new(&self.pool).exists(user_id).await
    }

    async fn add_admin(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        AdminRepository::new(&self.pool).add(user_id).await
    }

    async fn remove_admin(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        AdminRepository::new(&self.pool).remove(user_id).await
    }

    async fn list_admins(&self) -> Result<Vec<UserId>, RepositoryError> {
        AdminRepository::new(&self.pool).list().await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
