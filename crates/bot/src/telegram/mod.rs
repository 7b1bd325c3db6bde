//! Telegram Bot API integration.
//!
//! This module provides:
//! - [`TelegramClient`] for talking to the Bot API over HTTPS
//! - [`Messenger`], the seam the rest of the bot sends through
//! - [`RecordingMessenger`] for driving the bot in tests
//! - Update and keyboard types
//! - [`CallbackAction`], the parsed button vocabulary
//! - Message and keyboard builders in [`messages`]

mod callback;
mod client;
mod error;
pub mod messages;
mod recording;
mod types;

use async_trait::async_trait;

use krash_order_core::ChatId;

pub use callback::CallbackAction;
pub use client::TelegramClient;
pub use error::TelegramError;
pub use recording::{Outgoing, RecordingMessenger};
pub use types::{
    ApiResponse, CallbackQuery, Chat, ChatKind, InlineKeyboardButton, InlineKeyboardMarkup,
    InlineQuery, InlineQueryResultArticle, InputTextMessageContent, Message, MessageRef,
    ReplyParameters, SendMessage, Update, User,
};

/// Outbound chat operations used by the bot.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, request: SendMessage) -> Result<MessageRef, TelegramError>;

    async fn edit_message_text(
        &self,
        target: MessageRef,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError>;

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError>;

    async fn answer_inline_query(
        &self,
        inline_query_id: &str,
        results: Vec<InlineQueryResultArticle>,
    ) -> Result<(), TelegramError>;

    async fn delete_message(&self, target: MessageRef) -> Result<(), TelegramError>;

    /// Upload a CSV file as a document.
    async fn send_document(
        &self,
        chat_id: ChatId,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<MessageRef, TelegramError>;
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
