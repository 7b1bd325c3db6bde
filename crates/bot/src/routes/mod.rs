//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database ping)
//! POST /telegram/webhook       - Telegram update delivery
//! ```

pub mod health;
pub mod telegram;

use axum::Router;

use crate::state::AppState;

/// Build all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(telegram::router())
}
