//! Krash Order bot library.
//!
//! The Telegram ordering bot as a library, so the webhook server, the CLI and
//! the scenario tests share one implementation.
//!
//! # Flow
//!
//! ```text
//! POST /telegram/webhook -> handlers::handle_update -> session lock
//!     -> dialogue / cart / services::OrderService -> Store + Messenger
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod telegram;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use state::AppState;

/// Build the HTTP application with tracing and Sentry layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::routes())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::FixedOffset;
    use tower::ServiceExt;

    use super::*;
    use crate::db::MemoryStore;
    use crate::state::BotSettings;
    use crate::telegram::RecordingMessenger;

    fn state() -> AppState {
        AppState::new(
            BotSettings {
                admin_chat_ids: Vec::new(),
                manager_url: "https://t.me/Krash_order_Bot".to_string(),
                utc_offset: FixedOffset::east_opt(3 * 3600).expect("valid"),
                webhook_secret: None,
            },
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingMessenger::new()),
        )
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .uri("/admin")
                    .body(Body::empty())
                    .expect("valid request"),
            )
            .await
            .expect("infallible");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_requires_post() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .uri(config::WEBHOOK_PATH)
                    .body(Body::empty())
                    .expect("valid request"),
            )
            .await
            .expect("infallible");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
