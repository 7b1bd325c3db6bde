//! Update dispatcher.
//!
//! Every incoming [`Update`] is routed to exactly one handler. Handlers that
//! touch session state lock the sender's session first, so one user's events
//! are processed strictly in arrival order.
//!
//! Expected outcomes (validation prompts, missing steps, the cancellation
//! cutoff) are answered inside the handlers. Anything else bubbles up as an
//! [`AppError`] and is reported here with a generic reply.

mod callbacks;
mod commands;
mod dialogue;

use tracing::{error, instrument};

use krash_order_core::ChatId;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::state::AppState;
use crate::telegram::{InlineKeyboardMarkup, InlineQuery, Message, SendMessage, Update, messages};

pub use commands::Command;

/// Process one update. Never fails; errors are logged and reported to the
/// user as a generic message.
#[instrument(skip(state, update), fields(update_id = update.update_id))]
pub async fn handle_update(state: &AppState, update: Update) {
    let result = route(state, &update).await;
    if let Some(user) = update.sender() {
        state.sessions().evict_idle(user.id, state.now());
    }
    let Err(e) = result else {
        return;
    };

    if let Some(user) = update.sender() {
        set_sentry_user(user.id, user.username.as_deref());
    }
    let event_id = sentry::capture_error(&e);
    error!(error = %e, sentry_event_id = %event_id, "Update handling failed");
    clear_sentry_user();

    if let Some(chat_id) = reply_chat(&update) {
        let request = SendMessage::new(chat_id, messages::GENERIC_ERROR);
        if let Err(send_err) = state.messenger().send_message(request).await {
            error!(chat_id = %chat_id, error = %send_err, "Failed to report error to user");
        }
    }
    if let Some(callback) = &update.callback_query {
        if let Err(answer_err) = state
            .messenger()
            .answer_callback_query(&callback.id, None)
            .await
        {
            error!(error = %answer_err, "Failed to answer callback query");
        }
    }
}

async fn route(state: &AppState, update: &Update) -> Result<(), AppError> {
    if let Some(message) = &update.message {
        return on_message(state, message).await;
    }
    if let Some(callback) = &update.callback_query {
        return callbacks::handle(state, callback).await;
    }
    if let Some(query) = &update.inline_query {
        return on_inline_query(state, query).await;
    }
    Ok(())
}

async fn on_message(state: &AppState, message: &Message) -> Result<(), AppError> {
    let Some(from) = &message.from else {
        return Ok(());
    };
    if from.is_bot {
        return Ok(());
    }
    let Some(text) = message.text.as_deref() else {
        return Ok(());
    };

    match Command::parse(text) {
        Some(command) => commands::run(state, message, from, command).await,
        None if text.starts_with('/') => Ok(()),
        None => dialogue::on_text(state, message, from, text).await,
    }
}

async fn on_inline_query(state: &AppState, query: &InlineQuery) -> Result<(), AppError> {
    let results = messages::inline_results(&query.query);
    state
        .messenger()
        .answer_inline_query(&query.id, results)
        .await?;
    Ok(())
}

/// Chat a generic error reply should go to.
fn reply_chat(update: &Update) -> Option<ChatId> {
    if let Some(message) = &update.message {
        return Some(message.chat.id);
    }
    update
        .callback_query
        .as_ref()
        .and_then(|callback| callback.message.as_ref())
        .map(|message| message.chat.id)
}

/// Send `text` to `chat_id` with an optional keyboard.
async fn reply(
    state: &AppState,
    chat_id: ChatId,
    text: impl Into<String>,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<(), AppError> {
    let mut request = SendMessage::new(chat_id, text);
    request.reply_markup = markup;
    state.messenger().send_message(request).await?;
    Ok(())
}
