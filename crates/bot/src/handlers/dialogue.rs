//! Free text and dialogue commands.
//!
//! Runs [`session::dialogue::step`](crate::session::dialogue::step) under the
//! user's session lock and executes the returned effects in order.

use tracing::warn;

use krash_order_core::ChatId;

use super::reply;
use crate::error::AppError;
use crate::session::{DialogueInput, DialogueState, Effect, ReplyKeyboard, UserSession};
use crate::state::AppState;
use crate::telegram::{ChatKind, InlineKeyboardMarkup, Message, SendMessage, User, messages};

/// Which dialogue command was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DialogueCommand {
    Start,
    Register,
    Cancel,
}

pub(super) async fn on_text(
    state: &AppState,
    message: &Message,
    from: &User,
    text: &str,
) -> Result<(), AppError> {
    // The product title is the first line of a message inserted by inline search.
    let text = text.lines().next().unwrap_or_default();

    let mut session = state.sessions().lock(from.id).await;
    let registered = match session.dialogue {
        DialogueState::Idle => state.orders().client(from.id).await?.is_some(),
        _ => true,
    };

    run_step(
        state,
        &mut session,
        message.chat.id,
        from,
        DialogueInput::Text { text, registered },
    )
    .await
}

pub(super) async fn on_command(
    state: &AppState,
    message: &Message,
    from: &User,
    command: DialogueCommand,
) -> Result<(), AppError> {
    let private_chat = message.chat.kind == ChatKind::Private;
    let mut session = state.sessions().lock(from.id).await;

    let input = match command {
        DialogueCommand::Start => {
            let registered = private_chat && state.orders().client(from.id).await?.is_some();
            DialogueInput::Start {
                private_chat,
                registered,
            }
        }
        DialogueCommand::Register => DialogueInput::Register { private_chat },
        DialogueCommand::Cancel => DialogueInput::Cancel,
    };

    run_step(state, &mut session, message.chat.id, from, input).await
}

async fn run_step(
    state: &AppState,
    session: &mut UserSession,
    chat_id: ChatId,
    from: &User,
    input: DialogueInput<'_>,
) -> Result<(), AppError> {
    let previous = session.dialogue.clone();
    let transition = crate::session::dialogue::step(std::mem::take(&mut session.dialogue), input);
    session.dialogue = transition.state;

    for effect in transition.effects {
        match effect {
            Effect::Reply { text, keyboard } => {
                reply(state, chat_id, text, keyboard.map(reply_keyboard)).await?;
            }
            Effect::SaveProfile {
                organization,
                contact_person,
            } => {
                if let Err(e) = state
                    .orders()
                    .register(
                        from.id,
                        organization.as_str(),
                        contact_person.as_str(),
                        from.username.clone(),
                    )
                    .await
                {
                    // Back to the contact step.
                    session.dialogue = previous;
                    return Err(e.into());
                }
            }
            Effect::AddToCart { product, quantity } => {
                session.cart.add_or_increment(product, quantity);
                show_cart(state, session, chat_id).await?;
            }
        }
    }
    Ok(())
}

fn reply_keyboard(keyboard: ReplyKeyboard) -> InlineKeyboardMarkup {
    match keyboard {
        ReplyKeyboard::OpenMenu => messages::open_menu_keyboard(),
        ReplyKeyboard::StartMenu => messages::main_menu_keyboard(),
    }
}

/// Send a fresh cart message, retiring the previous one.
async fn show_cart(
    state: &AppState,
    session: &mut UserSession,
    chat_id: ChatId,
) -> Result<(), AppError> {
    if let Some(previous) = session.cart_message.take() {
        if let Err(e) = state.messenger().delete_message(previous).await {
            warn!(error = %e, "Failed to delete previous cart message");
        }
    }

    let text = messages::cart(&session.cart.snapshot());
    let mut request = SendMessage::new(chat_id, text);
    if !session.cart.is_empty() {
        request = request.with_markup(messages::cart_keyboard(&state.settings().manager_url));
    }

    let sent = state.messenger().send_message(request).await?;
    session.cart_message = Some(sent);
    Ok(())
}
