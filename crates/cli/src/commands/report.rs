//! Order report export.
//!
//! Writes the same CSV the `/stats` command sends to admins.
//!
//! # Usage
//!
//! ```bash
//! # Current month
//! ko-cli report export
//!
//! # A single day of the current year, or a whole month
//! ko-cli report export --period 05.03
//! ko-cli report export --period 03.2025 --output march.csv
//! ```
//!
//! # Environment Variables
//!
//! - `BOT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `BOT_UTC_OFFSET_HOURS` - Business time zone, decides what "today" is

use std::path::{Path, PathBuf};

use chrono::Utc;
use krash_order_bot::config::{self, ConfigError};
use krash_order_bot::db::{self, PgStore, RepositoryError};
use krash_order_bot::services::{PeriodError, ReportPeriod, aggregate_range};
use thiserror::Error;

/// Errors that can occur during export.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Period(#[from] PeriodError),

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Aggregate active orders for `period` and write them as CSV.
///
/// Returns the path written, or `None` when the period has no active orders.
///
/// # Errors
///
/// Returns error for a malformed period, a database failure or an
/// unwritable output path.
pub async fn export(
    period: Option<&str>,
    output: Option<&Path>,
) -> Result<Option<PathBuf>, ReportError> {
    dotenvy::dotenv().ok();
    let offset = config::utc_offset_from_env()?;
    let today = Utc::now().with_timezone(&offset).date_naive();
    let period = ReportPeriod::parse(period, today)?;
    let label = period.label();

    let database_url = config::database_url_from_env()?;
    tracing::info!("Connecting to database...");
    let store = PgStore::new(db::create_pool(&database_url).await?);

    let report = aggregate_range(&store, &period).await?;
    if report.is_empty() {
        tracing::warn!("No active orders: {}", label);
        return Ok(None);
    }

    let path = output.map_or_else(|| PathBuf::from(period.file_name()), Path::to_path_buf);
    tokio::fs::write(&path, report.to_csv(&label)).await?;

    tracing::info!(
        "Report written: {} ({} rows, {})",
        path.display(),
        report.rows.len(),
        label
    );
    Ok(Some(path))
}
