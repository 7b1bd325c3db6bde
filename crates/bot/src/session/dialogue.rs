//! Registration and quantity-entry dialogue.
//!
//! The dialogue is a tagged state per user plus a pure transition function.
//! [`step`] never performs I/O: it returns the next state and a list of
//! effects, and the dispatcher executes the effects in order.

use krash_order_core::{Catalog, NameError, PartyName, Product};

use crate::telegram::messages;

/// Where a user is in a multi-step conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DialogueState {
    #[default]
    Idle,
    AwaitingOrganization,
    AwaitingContact {
        organization: PartyName,
    },
    AwaitingQuantity {
        product: &'static Product,
    },
}

/// An event that can move the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueInput<'a> {
    /// `/start`.
    Start { private_chat: bool, registered: bool },
    /// `/register`: run registration even when a profile exists.
    Register { private_chat: bool },
    /// `/cancel`.
    Cancel,
    /// Any non-command text message.
    Text { text: &'a str, registered: bool },
}

/// Keyboards a dialogue reply can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKeyboard {
    /// Inline product search.
    OpenMenu,
    /// Product search plus "my orders" and "about".
    StartMenu,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Reply {
        text: String,
        keyboard: Option<ReplyKeyboard>,
    },
    /// Persist the completed profile.
    SaveProfile {
        organization: PartyName,
        contact_person: PartyName,
    },
    /// Add to the cart, then show it.
    AddToCart {
        product: &'static Product,
        quantity: u32,
    },
}

impl Effect {
    fn reply(text: impl Into<String>) -> Self {
        Self::Reply {
            text: text.into(),
            keyboard: None,
        }
    }
}

/// Result of one dialogue step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: DialogueState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: DialogueState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }
}

/// Advance the dialogue.
#[must_use]
pub fn step(state: DialogueState, input: DialogueInput<'_>) -> Transition {
    match input {
        DialogueInput::Start {
            private_chat: false,
            ..
        }
        | DialogueInput::Register {
            private_chat: false,
        } => Transition::to(
            DialogueState::Idle,
            vec![Effect::reply(messages::PRIVATE_CHAT_ONLY)],
        ),
        DialogueInput::Start {
            registered: true, ..
        } => Transition::to(
            DialogueState::Idle,
            vec![Effect::Reply {
                text: messages::ALREADY_REGISTERED.to_string(),
                keyboard: Some(ReplyKeyboard::StartMenu),
            }],
        ),
        DialogueInput::Start { .. } | DialogueInput::Register { .. } => Transition::to(
            DialogueState::AwaitingOrganization,
            vec![Effect::reply(messages::WELCOME)],
        ),
        DialogueInput::Cancel => Transition::to(
            DialogueState::Idle,
            vec![Effect::reply(messages::REGISTRATION_CANCELLED)],
        ),
        DialogueInput::Text { text, registered } => on_text(state, text, registered),
    }
}

fn on_text(state: DialogueState, text: &str, registered: bool) -> Transition {
    match state {
        DialogueState::AwaitingOrganization => match PartyName::parse(text) {
            Ok(organization) => Transition::to(
                DialogueState::AwaitingContact { organization },
                vec![Effect::reply(messages::ASK_CONTACT)],
            ),
            Err(e) => Transition::to(
                DialogueState::AwaitingOrganization,
                vec![Effect::reply(name_error_prompt(&e, NameField::Organization))],
            ),
        },
        DialogueState::AwaitingContact { organization } => match PartyName::parse(text) {
            Ok(contact_person) => Transition::to(
                DialogueState::Idle,
                vec![
                    Effect::SaveProfile {
                        organization,
                        contact_person,
                    },
                    Effect::Reply {
                        text: messages::REGISTRATION_DONE.to_string(),
                        keyboard: Some(ReplyKeyboard::OpenMenu),
                    },
                ],
            ),
            Err(e) => Transition::to(
                DialogueState::AwaitingContact { organization },
                vec![Effect::reply(name_error_prompt(&e, NameField::Contact))],
            ),
        },
        DialogueState::AwaitingQuantity { product } => match parse_quantity(text) {
            Ok(quantity) => Transition::to(
                DialogueState::Idle,
                vec![Effect::AddToCart { product, quantity }],
            ),
            Err(prompt) => Transition::to(
                DialogueState::AwaitingQuantity { product },
                vec![Effect::reply(prompt)],
            ),
        },
        DialogueState::Idle if !registered => Transition::to(
            DialogueState::Idle,
            vec![Effect::reply(messages::FINISH_REGISTRATION)],
        ),
        DialogueState::Idle => match Catalog::find_by_title(text) {
            Some(product) => Transition::to(
                DialogueState::AwaitingQuantity { product },
                vec![Effect::reply(messages::product_selected(product))],
            ),
            None => Transition::to(
                DialogueState::Idle,
                vec![Effect::reply(messages::PRODUCT_NOT_FOUND)],
            ),
        },
    }
}

#[derive(Clone, Copy)]
enum NameField {
    Organization,
    Contact,
}

fn name_error_prompt(error: &NameError, field: NameField) -> String {
    match (error, field) {
        (NameError::Empty, NameField::Organization) => messages::ORGANIZATION_EMPTY.to_string(),
        (NameError::Empty, NameField::Contact) => messages::CONTACT_EMPTY.to_string(),
        (NameError::TooLong { max }, _) => {
            format!("Слишком длинное значение, максимум {max} символов. Попробуйте снова:")
        }
        (NameError::InvalidCharacters, NameField::Organization) => {
            messages::ORGANIZATION_INVALID.to_string()
        }
        (NameError::InvalidCharacters, NameField::Contact) => {
            messages::CONTACT_INVALID.to_string()
        }
    }
}

fn parse_quantity(text: &str) -> Result<u32, &'static str> {
    let value: i64 = text
        .trim()
        .parse()
        .map_err(|_| messages::QUANTITY_NOT_NUMBER)?;
    if value <= 0 {
        return Err(messages::QUANTITY_NOT_POSITIVE);
    }
    u32::try_from(value).map_err(|_| messages::QUANTITY_NOT_NUMBER)
}
