//! Scenario tests for the Krash ordering bot.
//!
//! The bot runs against [`MemoryStore`] and [`RecordingMessenger`], so no
//! database or network is needed:
//!
//! ```bash
//! cargo test -p krash-order-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `registration` - `/start`, the registration dialogue, `/info`
//! - `cart` - Product selection, quantities and cart navigation
//! - `ordering` - Slot selection, commit and cancellation
//! - `admin` - Admin commands and the CSV report
//! - `webhook` - HTTP surface: secret check, parsing, health

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use secrecy::SecretString;
use serde_json::{Value, json};

use krash_order_bot::db::MemoryStore;
use krash_order_bot::handlers::handle_update;
use krash_order_bot::state::{AppState, BotSettings};
use krash_order_bot::telegram::{MessageRef, Outgoing, RecordingMessenger, Update};
use krash_order_core::{ChatId, UserId};

/// Staff chat configured through `ADMIN_CHAT_ID`; also a private chat with
/// user 900.
pub const ADMIN_CHAT: ChatId = ChatId::new(900);
pub const MANAGER_URL: &str = "https://t.me/Krash_order_Bot";
pub const WEBHOOK_SECRET: &str = "q8Zr3LxP0vNw5TkY";

/// A Telegram user talking to the bot in a private chat.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: UserId,
    pub username: Option<String>,
}

impl TestUser {
    #[must_use]
    pub fn new(id: i64, username: Option<&str>) -> Self {
        Self {
            id: UserId::new(id),
            username: username.map(str::to_string),
        }
    }

    #[must_use]
    pub const fn chat(&self) -> ChatId {
        ChatId::private(self.id)
    }

    fn json(&self) -> Value {
        json!({
            "id": self.id.get(),
            "is_bot": false,
            "first_name": "Тест",
            "username": self.username,
        })
    }
}

/// The bot wired to in-memory collaborators.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub messenger: Arc<RecordingMessenger>,
    pub state: AppState,
    next_update_id: AtomicI64,
    next_incoming_id: AtomicI32,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Context with [`ADMIN_CHAT`] as configured admin, no webhook secret and
    /// the clock frozen at 2025-03-08 12:00.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Same as [`TestContext::new`] but the webhook requires [`WEBHOOK_SECRET`].
    #[must_use]
    pub fn with_webhook_secret() -> Self {
        Self::build(Some(SecretString::from(WEBHOOK_SECRET)))
    }

    fn build(webhook_secret: Option<SecretString>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let settings = BotSettings {
            admin_chat_ids: vec![ADMIN_CHAT],
            manager_url: MANAGER_URL.to_string(),
            utc_offset: FixedOffset::east_opt(3 * 3600).expect("valid offset"),
            webhook_secret,
        };
        let state = AppState::new(settings, store.clone(), messenger.clone());
        state.clock().freeze(at("2025-03-08", 12, 0));

        Self {
            store,
            messenger,
            state,
            next_update_id: AtomicI64::new(1),
            next_incoming_id: AtomicI32::new(1),
        }
    }

    fn update_id(&self) -> i64 {
        self.next_update_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn dispatch(&self, value: Value) {
        let update: Update = serde_json::from_value(value).expect("valid update");
        handle_update(&self.state, update).await;
    }

    /// Raw update JSON for a private text message.
    #[must_use]
    pub fn text_update(&self, user: &TestUser, text: &str) -> Value {
        json!({
            "update_id": self.update_id(),
            "message": {
                "message_id": self.next_incoming_id.fetch_add(1, Ordering::SeqCst),
                "date": 1_741_424_400,
                "from": user.json(),
                "chat": {"id": user.chat().get(), "type": "private"},
                "text": text,
            }
        })
    }

    /// Send a text message in the user's private chat.
    pub async fn send_text(&self, user: &TestUser, text: &str) {
        let update = self.text_update(user, text);
        self.dispatch(update).await;
    }

    /// Send a text message in a group chat.
    pub async fn send_group_text(&self, user: &TestUser, group: i64, text: &str) {
        let update = json!({
            "update_id": self.update_id(),
            "message": {
                "message_id": self.next_incoming_id.fetch_add(1, Ordering::SeqCst),
                "date": 1_741_424_400,
                "from": user.json(),
                "chat": {"id": group, "type": "group", "title": "Пекарня"},
                "text": text,
            }
        });
        self.dispatch(update).await;
    }

    /// Press a button on `message`.
    pub async fn press_on(&self, user: &TestUser, message: MessageRef, data: &str) {
        let update = json!({
            "update_id": self.update_id(),
            "callback_query": {
                "id": format!("cb-{}", self.update_id()),
                "from": user.json(),
                "chat_instance": "1",
                "data": data,
                "message": {
                    "message_id": message.message_id.get(),
                    "date": 1_741_424_400,
                    "chat": {"id": message.chat_id.get(), "type": "private"},
                    "text": "",
                }
            }
        });
        self.dispatch(update).await;
    }

    /// Press a button on the last message the bot sent to the user.
    pub async fn press(&self, user: &TestUser, data: &str) {
        let message = self
            .last_sent(user.chat())
            .await
            .expect("bot has sent a message to press on");
        self.press_on(user, message, data).await;
    }

    /// Type an inline query.
    pub async fn inline_query(&self, user: &TestUser, query: &str) {
        let update = json!({
            "update_id": self.update_id(),
            "inline_query": {
                "id": format!("iq-{}", self.update_id()),
                "from": user.json(),
                "query": query,
                "offset": "",
            }
        });
        self.dispatch(update).await;
    }

    /// Run the full registration dialogue.
    pub async fn register(&self, user: &TestUser, organization: &str, contact: &str) {
        self.send_text(user, "/start").await;
        self.send_text(user, organization).await;
        self.send_text(user, contact).await;
    }

    /// Put `quantity` of `title` in the cart.
    pub async fn add_to_cart(&self, user: &TestUser, title: &str, quantity: u32) {
        self.send_text(user, title).await;
        self.send_text(user, &quantity.to_string()).await;
    }

    /// Address of the last message the bot sent (not edited) to `chat_id`.
    pub async fn last_sent(&self, chat_id: ChatId) -> Option<MessageRef> {
        self.messenger
            .outgoing_to(chat_id)
            .await
            .iter()
            .rev()
            .find_map(|o| match o {
                Outgoing::Message { sent, .. } => Some(*sent),
                _ => None,
            })
    }

    /// Most recent text shown in `chat_id`, sent or edited.
    pub async fn last_text(&self, chat_id: ChatId) -> String {
        self.messenger
            .last_text(chat_id)
            .await
            .unwrap_or_default()
    }

    /// Text of the most recent callback answer.
    pub async fn last_callback_notice(&self) -> Option<String> {
        self.messenger
            .outgoing()
            .await
            .iter()
            .rev()
            .find_map(|o| match o {
                Outgoing::CallbackAnswer { text, .. } => Some(text.clone()),
                _ => None,
            })
            .flatten()
    }

    /// `callback_data` of every button on the latest keyboard in `chat_id`.
    pub async fn last_buttons(&self, chat_id: ChatId) -> Vec<String> {
        self.messenger
            .outgoing_to(chat_id)
            .await
            .iter()
            .rev()
            .find(|o| o.text().is_some())
            .and_then(Outgoing::markup)
            .map(|markup| {
                markup
                    .buttons()
                    .filter_map(|b| b.callback_data.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Messages sent to the admin chat.
    pub async fn admin_messages(&self) -> Vec<Outgoing> {
        self.messenger
            .outgoing_to(ADMIN_CHAT)
            .await
            .into_iter()
            .filter(|o| matches!(o, Outgoing::Message { .. }))
            .collect()
    }

    /// Pin the bot's clock.
    pub fn freeze(&self, at: NaiveDateTime) {
        self.state.clock().freeze(at);
    }
}

/// `date` (`YYYY-MM-DD`) at `hour:minute`.
#[must_use]
pub fn at(date: &str, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .expect("valid date")
        .and_hms_opt(hour, minute, 0)
        .expect("valid time")
}
