//! Telegram Bot API client.
//!
//! Every method is a JSON POST to `{api_url}/bot{token}/{method}`. The token
//! is part of the URL, so request errors are stripped of their URL before
//! they are logged or returned.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument, warn};

use krash_order_core::{ChatId, MessageId};

use super::Messenger;
use super::error::TelegramError;
use super::types::{
    ApiResponse, InlineKeyboardMarkup, InlineQueryResultArticle, Message, MessageRef, SendMessage,
};
use crate::config::TelegramConfig;

/// Upper bound for one Bot API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Update kinds the bot subscribes to.
const ALLOWED_UPDATES: [&str; 3] = ["message", "callback_query", "inline_query"];

/// Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    bot_token: SecretString,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .field("bot_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    #[must_use]
    pub fn new(api_url: impl Into<String>, bot_token: SecretString) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build HTTP client, using defaults");
                Client::new()
            });
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            bot_token,
        }
    }

    #[must_use]
    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(config.api_url.clone(), config.bot_token.clone())
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_url,
            self.bot_token.expose_secret()
        )
    }

    async fn call<P, R>(&self, method: &str, payload: &P) -> Result<R, TelegramError>
    where
        P: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|e| TelegramError::Request(e.without_url().to_string()))?;

        Self::parse_response(method, response).await
    }

    async fn parse_response<R: DeserializeOwned + Send>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<R, TelegramError> {
        let result: ApiResponse<R> = response
            .json()
            .await
            .map_err(|e| TelegramError::Response(e.without_url().to_string()))?;

        if !result.ok {
            let err = TelegramError::Api {
                code: result.error_code.unwrap_or_default(),
                description: result
                    .description
                    .unwrap_or_else(|| "Unknown error".to_string()),
            };
            if !err.is_not_modified() {
                error!(method, error = %err, "Telegram API error");
            }
            return Err(err);
        }

        result
            .result
            .ok_or_else(|| TelegramError::Response(format!("{method}: missing result")))
    }

    /// Point Telegram at our webhook endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Telegram rejects the URL.
    #[instrument(skip(self, secret_token))]
    pub async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&SecretString>,
        drop_pending_updates: bool,
    ) -> Result<(), TelegramError> {
        #[derive(Serialize)]
        struct SetWebhook<'a> {
            url: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            secret_token: Option<&'a str>,
            allowed_updates: [&'static str; 3],
            drop_pending_updates: bool,
        }

        let _: bool = self
            .call(
                "setWebhook",
                &SetWebhook {
                    url,
                    secret_token: secret_token.map(|s| s.expose_secret()),
                    allowed_updates: ALLOWED_UPDATES,
                    drop_pending_updates,
                },
            )
            .await?;

        debug!(url, "Webhook registered");
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    #[instrument(skip(self, request), fields(chat_id = %request.chat_id))]
    async fn send_message(&self, request: SendMessage) -> Result<MessageRef, TelegramError> {
        let message: Message = self.call("sendMessage", &request).await?;
        debug!(message_id = %message.message_id, "Message sent");
        Ok(message.reference())
    }

    #[instrument(skip(self, text, markup))]
    async fn edit_message_text(
        &self,
        target: MessageRef,
        text: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        #[derive(Serialize)]
        struct EditMessageText<'a> {
            chat_id: ChatId,
            message_id: MessageId,
            text: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            reply_markup: Option<InlineKeyboardMarkup>,
        }

        let request = EditMessageText {
            chat_id: target.chat_id,
            message_id: target.message_id,
            text,
            reply_markup: markup,
        };

        // Result is the edited Message, or `true` for inline messages.
        match self
            .call::<_, serde_json::Value>("editMessageText", &request)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_modified() => {
                debug!("Message already up to date");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, text))]
    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        #[derive(Serialize)]
        struct AnswerCallbackQuery<'a> {
            callback_query_id: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            text: Option<&'a str>,
        }

        let _: bool = self
            .call(
                "answerCallbackQuery",
                &AnswerCallbackQuery {
                    callback_query_id,
                    text,
                },
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, results), fields(count = results.len()))]
    async fn answer_inline_query(
        &self,
        inline_query_id: &str,
        results: Vec<InlineQueryResultArticle>,
    ) -> Result<(), TelegramError> {
        #[derive(Serialize)]
        struct AnswerInlineQuery<'a> {
            inline_query_id: &'a str,
            results: Vec<InlineQueryResultArticle>,
            cache_time: u32,
        }

        let _: bool = self
            .call(
                "answerInlineQuery",
                &AnswerInlineQuery {
                    inline_query_id,
                    results,
                    cache_time: 60,
                },
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_message(&self, target: MessageRef) -> Result<(), TelegramError> {
        #[derive(Serialize)]
        struct DeleteMessage {
            chat_id: ChatId,
            message_id: MessageId,
        }

        let _: bool = self
            .call(
                "deleteMessage",
                &DeleteMessage {
                    chat_id: target.chat_id,
                    message_id: target.message_id,
                },
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, content), fields(chat_id = %chat_id, bytes = content.len()))]
    async fn send_document(
        &self,
        chat_id: ChatId,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<MessageRef, TelegramError> {
        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(|e| TelegramError::Request(e.to_string()))?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TelegramError::Request(e.without_url().to_string()))?;

        let message: Message = Self::parse_response("sendDocument", response).await?;
        debug!(message_id = %message.message_id, "Document sent");
        Ok(message.reference())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        let client = TelegramClient::new("https://api.telegram.org/", SecretString::from("1:abc"));
        assert_eq!(
            client.method_url("sendMessage"),
            "https://api.telegram.org/bot1:abc/sendMessage"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = TelegramClient::new(
            "https://api.telegram.org",
            SecretString::from("7012345678:AAHk3vQ9x_Lr2mZpT8sWnY4bC6dE1fG0hJk"),
        );
        let debug_output = format!("{client:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("AAHk3vQ9x"));
    }

    #[test]
    fn test_not_modified_detection() {
        let err = TelegramError::Api {
            code: 400,
            description: "Bad Request: message is not modified: specified new message content and reply markup are exactly the same".to_string(),
        };
        assert!(err.is_not_modified());
        assert!(
            !TelegramError::Api {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string()
            }
            .is_not_modified()
        );
    }
}
