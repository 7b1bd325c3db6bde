//! Registration dialogue and profile commands.

use krash_order_bot::telegram::messages;
use krash_order_core::{ChatId, UserId};
use krash_order_integration_tests::{TestContext, TestUser};

#[tokio::test]
async fn test_registration_happy_path() {
    let ctx = TestContext::new();
    let user = TestUser::new(1, Some("roga"));

    ctx.send_text(&user, "/start").await;
    assert_eq!(ctx.last_text(user.chat()).await, messages::WELCOME);

    ctx.send_text(&user, "ООО Рога").await;
    assert_eq!(ctx.last_text(user.chat()).await, messages::ASK_CONTACT);

    ctx.send_text(&user, "Иванов Иван").await;
    assert_eq!(ctx.last_text(user.chat()).await, messages::REGISTRATION_DONE);

    let profile = ctx
        .state
        .orders()
        .client(UserId::new(1))
        .await
        .expect("store reachable")
        .expect("registered");
    assert_eq!(profile.organization.as_str(), "ООО Рога");
    assert_eq!(profile.contact_person.as_str(), "Иванов Иван");
    assert_eq!(profile.username.as_deref(), Some("roga"));

    ctx.send_text(&user, "/info").await;
    let info = ctx.last_text(user.chat()).await;
    assert!(info.contains("ООО Рога"));
    assert!(info.contains("Иванов Иван"));
}

#[tokio::test]
async fn test_invalid_organization_stays_on_step() {
    let ctx = TestContext::new();
    let user = TestUser::new(1, None);

    ctx.send_text(&user, "/start").await;
    ctx.send_text(&user, "Рога123").await;
    assert_eq!(
        ctx.last_text(user.chat()).await,
        messages::ORGANIZATION_INVALID
    );

    ctx.send_text(&user, "   ").await;
    assert_eq!(ctx.last_text(user.chat()).await, messages::ORGANIZATION_EMPTY);

    ctx.send_text(&user, "ООО Рога").await;
    assert_eq!(ctx.last_text(user.chat()).await, messages::ASK_CONTACT);
    assert!(
        ctx.state
            .orders()
            .client(user.id)
            .await
            .expect("ok")
            .is_none()
    );
}

#[tokio::test]
async fn test_start_in_group_is_refused() {
    let ctx = TestContext::new();
    let user = TestUser::new(1, None);

    ctx.send_group_text(&user, -100_500, "/start").await;
    assert_eq!(
        ctx.last_text(ChatId::new(-100_500)).await,
        messages::PRIVATE_CHAT_ONLY
    );
    assert!(ctx.messenger.outgoing_to(user.chat()).await.is_empty());
}

#[tokio::test]
async fn test_start_when_registered_shows_main_menu() {
    let ctx = TestContext::new();
    let user = TestUser::new(1, None);
    ctx.register(&user, "ООО Рога", "Иванов Иван").await;

    ctx.send_text(&user, "/start").await;
    assert_eq!(ctx.last_text(user.chat()).await, messages::ALREADY_REGISTERED);
    assert_eq!(
        ctx.last_buttons(user.chat()).await,
        vec!["catalog", "my_orders", "about"]
    );
}

#[tokio::test]
async fn test_cancel_abandons_registration() {
    let ctx = TestContext::new();
    let user = TestUser::new(1, None);

    ctx.send_text(&user, "/start").await;
    ctx.send_text(&user, "ООО Рога").await;
    ctx.send_text(&user, "/cancel").await;
    assert_eq!(
        ctx.last_text(user.chat()).await,
        messages::REGISTRATION_CANCELLED
    );

    // Back to idle: text is no longer taken as a contact name.
    ctx.send_text(&user, "Иванов Иван").await;
    assert_eq!(
        ctx.last_text(user.chat()).await,
        messages::FINISH_REGISTRATION
    );
}

#[tokio::test]
async fn test_unregistered_user_cannot_pick_products() {
    let ctx = TestContext::new();
    let user = TestUser::new(1, None);

    ctx.send_text(&user, "Классический круассан").await;
    assert_eq!(
        ctx.last_text(user.chat()).await,
        messages::FINISH_REGISTRATION
    );
}

#[tokio::test]
async fn test_save_failure_keeps_contact_step() {
    let ctx = TestContext::new();
    let user = TestUser::new(1, None);

    ctx.send_text(&user, "/start").await;
    ctx.send_text(&user, "ООО Рога").await;

    ctx.store.set_unavailable(true);
    ctx.send_text(&user, "Иванов Иван").await;
    assert_eq!(ctx.last_text(user.chat()).await, messages::GENERIC_ERROR);

    ctx.store.set_unavailable(false);
    ctx.send_text(&user, "Иванов Иван").await;
    assert_eq!(ctx.last_text(user.chat()).await, messages::REGISTRATION_DONE);
    assert!(ctx.state.orders().client(user.id).await.expect("ok").is_some());
}

#[tokio::test]
async fn test_register_overwrites_profile() {
    let ctx = TestContext::new();
    let user = TestUser::new(1, None);
    ctx.register(&user, "ООО Рога", "Иванов Иван").await;

    ctx.send_text(&user, "/register").await;
    assert_eq!(ctx.last_text(user.chat()).await, messages::WELCOME);
    ctx.send_text(&user, "ИП Копыта").await;
    ctx.send_text(&user, "Петров Пётр").await;

    let profile = ctx
        .state
        .orders()
        .client(user.id)
        .await
        .expect("ok")
        .expect("registered");
    assert_eq!(profile.organization.as_str(), "ИП Копыта");
    assert_eq!(profile.contact_person.as_str(), "Петров Пётр");
}

#[tokio::test]
async fn test_info_for_unknown_user() {
    let ctx = TestContext::new();
    let user = TestUser::new(1, None);

    ctx.send_text(&user, "/info").await;
    assert_eq!(ctx.last_text(user.chat()).await, messages::NOT_REGISTERED);
}
