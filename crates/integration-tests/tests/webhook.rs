//! HTTP surface: health probes and webhook delivery.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use krash_order_bot::routes::telegram::SECRET_HEADER;
use krash_order_bot::telegram::messages;
use krash_order_integration_tests::{TestContext, TestUser, WEBHOOK_SECRET};

async fn get(ctx: &TestContext, uri: &str) -> (StatusCode, String) {
    let response = krash_order_bot::app(ctx.state.clone())
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("infallible");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    (status, String::from_utf8_lossy(&body).into_owned())
}

async fn post_update(ctx: &TestContext, secret: Option<&str>, body: String) -> StatusCode {
    let mut request = Request::builder()
        .method("POST")
        .uri("/telegram/webhook")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        request = request.header(SECRET_HEADER, secret);
    }

    krash_order_bot::app(ctx.state.clone())
        .oneshot(request.body(Body::from(body)).expect("valid request"))
        .await
        .expect("infallible")
        .status()
}

#[tokio::test]
async fn test_liveness() {
    let ctx = TestContext::new();
    let (status, body) = get(&ctx, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_readiness_follows_store() {
    let ctx = TestContext::new();
    assert_eq!(get(&ctx, "/health/ready").await.0, StatusCode::OK);

    ctx.store.set_unavailable(true);
    assert_eq!(
        get(&ctx, "/health/ready").await.0,
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn test_webhook_rejects_missing_or_wrong_secret() {
    let ctx = TestContext::with_webhook_secret();
    let user = TestUser::new(7, None);

    let update = ctx.text_update(&user, "/start").to_string();
    assert_eq!(
        post_update(&ctx, None, update.clone()).await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        post_update(&ctx, Some("guess"), update).await,
        StatusCode::UNAUTHORIZED
    );
    assert!(ctx.messenger.outgoing().await.is_empty());
}

#[tokio::test]
async fn test_webhook_dispatches_update() {
    let ctx = TestContext::with_webhook_secret();
    let user = TestUser::new(7, None);

    let update = ctx.text_update(&user, "/start").to_string();
    assert_eq!(
        post_update(&ctx, Some(WEBHOOK_SECRET), update).await,
        StatusCode::OK
    );
    assert_eq!(ctx.last_text(user.chat()).await, messages::WELCOME);
}

#[tokio::test]
async fn test_webhook_without_configured_secret_accepts_any_call() {
    let ctx = TestContext::new();
    let user = TestUser::new(7, None);

    let update = ctx.text_update(&user, "/info").to_string();
    assert_eq!(post_update(&ctx, None, update).await, StatusCode::OK);
    assert_eq!(ctx.last_text(user.chat()).await, messages::NOT_REGISTERED);
}

#[tokio::test]
async fn test_webhook_rejects_malformed_body() {
    let ctx = TestContext::with_webhook_secret();
    assert_eq!(
        post_update(&ctx, Some(WEBHOOK_SECRET), "{not json".to_string()).await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_webhook_acknowledges_failed_handling() {
    let ctx = TestContext::new();
    let user = TestUser::new(7, None);
    ctx.store.set_unavailable(true);

    let update = ctx.text_update(&user, "Классический круассан").to_string();
    assert_eq!(post_update(&ctx, None, update).await, StatusCode::OK);
    assert_eq!(ctx.last_text(user.chat()).await, messages::GENERIC_ERROR);
}

#[tokio::test]
async fn test_unknown_update_kinds_are_acknowledged() {
    let ctx = TestContext::new();
    let body = r#"{"update_id": 77, "edited_message": {"message_id": 1}}"#.to_string();
    assert_eq!(post_update(&ctx, None, body).await, StatusCode::OK);
    assert!(ctx.messenger.outgoing().await.is_empty());
}
