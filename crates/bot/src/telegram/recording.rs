//! A [`Messenger`] that records every call instead of sending it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use krash_order_core::{ChatId, MessageId};

use super::Messenger;
use super::error::TelegramError;
use super::types::{InlineKeyboardMarkup, InlineQueryResultArticle, MessageRef, SendMessage};

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Message {
        sent: MessageRef,
        request: SendMessage,
    },
    Edit {
        target: MessageRef,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    },
    CallbackAnswer {
        id: String,
        text: Option<String>,
    },
    InlineAnswer {
        id: String,
        results: Vec<InlineQueryResultArticle>,
    },
    Delete {
        target: MessageRef,
    },
    Document {
        sent: MessageRef,
        file_name: String,
        content: Vec<u8>,
    },
}

impl Outgoing {
    /// Visible text of a sent or edited message.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Message { request, .. } => Some(&request.text),
            Self::Edit { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Keyboard of a sent or edited message.
    #[must_use]
    pub const fn markup(&self) -> Option<&InlineKeyboardMarkup> {
        match self {
            Self::Message { request, .. } => request.reply_markup.as_ref(),
            Self::Edit { markup, .. } => markup.as_ref(),
            _ => None,
        }
    }

    /// Chat the call was addressed to, if any.
    #[must_use]
    pub const fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::Message { sent, .. } | Self::Document { sent, .. } => Some(sent.chat_id),
            Self::Edit { target, .. } | Self::Delete { target } => Some(target.chat_id),
            _ => None,
        }
    }
}

/// Records outbound calls; sends to chats marked failing return an error.
#[derive(Debug)]
pub struct RecordingMessenger {
    outgoing: Mutex<Vec<Outgoing>>,
    failing_chats: Mutex<HashSet<ChatId>>,
    next_message_id: AtomicI32,
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self {
            outgoing: Mutex::new(Vec::new()),
            failing_chats: Mutex::new(HashSet::new()),
            next_message_id: AtomicI32::new(1000),
        }
    }
}

impl RecordingMessenger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `chat_id` fail as if the bot were blocked.
    pub async fn fail_chat(&self, chat_id: ChatId) {
        self.failing_chats.lock().await.insert(chat_id);
    }

    /// Everything recorded so far.
    pub async fn outgoing(&self) -> Vec<Outgoing> {
        self.outgoing.lock().await.clone()
    }

    /// Recorded calls addressed to one chat.
    pub async fn outgoing_to(&self, chat_id: ChatId) -> Vec<Outgoing> {
        self.outgoing
            .lock()
            .await
            .iter()
            .filter(|o| o.chat_id() == Some(chat_id))
            .cloned()
            .collect()
    }

    /// The most recent visible text sent or edited in `chat_id`.
    pub async fn last_text(&self, chat_id: ChatId) -> Option<String> {
        self.outgoing_to(chat_id)
            .await
            .iter()
            .rev()
            .find_map(|o| o.text().map(str::to_string))
    }

    /// Drop everything recorded so far.
    pub async fn clear(&self) {
        self.outgoing.lock().await.clear();
    }

    async fn check(&self, chat_id: ChatId) -> Result<(), TelegramError> {
        if self.failing_chats.lock().await.contains(&chat_id) {
            return Err(TelegramError::Api {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        Ok(())
    }

    fn next_ref(&self, chat_id: ChatId) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId::new(self.next_message_id.fetch_add(1, Ordering::SeqCst)),
        }
    }

    async fn record(&self, outgoing: Outgoing) {
        self.outgoing.lock().await.push(outgoing);
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, request: SendMessage) -> Result<MessageRef, TelegramError> {
        self.check(request.chat_id).await?;
        let sent = self.next_ref(request.chat_id);
        self.record(Outgoing::Message { sent, request }).await;
        Ok(sent)
    }

    async fn edit_message_text(
        &self,
        target: MessageRef,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        self.check(target.chat_id).await?;
        self.record(Outgoing::Edit {
            target,
            text: text.to_string(),
            markup,
        })
        .await;
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.record(Outgoing::CallbackAnswer {
            id: callback_query_id.to_string(),
            text: text.map(str::to_string),
        })
        .await;
        Ok(())
    }

    async fn answer_inline_query(
        &self,
        inline_query_id: &str,
        results: Vec<InlineQueryResultArticle>,
    ) -> Result<(), TelegramError> {
        self.record(Outgoing::InlineAnswer {
            id: inline_query_id.to_string(),
            results,
        })
        .await;
        Ok(())
    }

    async fn delete_message(&self, target: MessageRef) -> Result<(), TelegramError> {
        self.check(target.chat_id).await?;
        self.record(Outgoing::Delete { target }).await;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<MessageRef, TelegramError> {
        self.check(chat_id).await?;
        let sent = self.next_ref(chat_id);
        self.record(Outgoing::Document {
            sent,
            file_name: file_name.to_string(),
            content,
        })
        .await;
        Ok(sent)
    }
}
