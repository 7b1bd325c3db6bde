//! Slash commands.

use tracing::{error, info, instrument, warn};

use krash_order_core::{ChatId, UserId};

use super::dialogue::{self, DialogueCommand};
use super::reply;
use crate::error::AppError;
use crate::services::{AdminChange, ReportPeriod, aggregate_range};
use crate::state::AppState;
use crate::telegram::{Message, User, messages};

/// A recognised slash command with its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Register,
    Cancel,
    Info,
    Stats(Option<String>),
    AddAdmin(Option<String>),
    RemoveAdmin(Option<String>),
}

impl Command {
    /// Parse `/name[@bot] [argument]`. Returns `None` for plain text and
    /// unknown commands.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix('/')?;
        let (head, argument) = match rest.split_once(char::is_whitespace) {
            Some((head, argument)) => (head, Some(argument.trim())),
            None => (rest, None),
        };
        let name = head.split_once('@').map_or(head, |(name, _)| name);
        let argument = argument.filter(|a| !a.is_empty()).map(str::to_string);

        Some(match name {
            "start" => Self::Start,
            "register" => Self::Register,
            "cancel" => Self::Cancel,
            "info" => Self::Info,
            "stats" => Self::Stats(argument),
            "add_admin" => Self::AddAdmin(argument),
            "remove_admin" => Self::RemoveAdmin(argument),
            _ => return None,
        })
    }
}

#[instrument(skip(state, message, from), fields(user_id = %from.id))]
pub(super) async fn run(
    state: &AppState,
    message: &Message,
    from: &User,
    command: Command,
) -> Result<(), AppError> {
    let chat_id = message.chat.id;
    match command {
        Command::Start => dialogue::on_command(state, message, from, DialogueCommand::Start).await,
        Command::Register => {
            dialogue::on_command(state, message, from, DialogueCommand::Register).await
        }
        Command::Cancel => {
            dialogue::on_command(state, message, from, DialogueCommand::Cancel).await
        }
        Command::Info => info(state, chat_id, from.id).await,
        Command::Stats(period) => {
            if require_admin(state, chat_id, from.id).await? {
                stats(state, chat_id, period.as_deref()).await?;
            }
            Ok(())
        }
        Command::AddAdmin(argument) => {
            if require_admin(state, chat_id, from.id).await? {
                change_admin(state, chat_id, argument.as_deref(), AdminAction::Add).await?;
            }
            Ok(())
        }
        Command::RemoveAdmin(argument) => {
            if require_admin(state, chat_id, from.id).await? {
                change_admin(state, chat_id, argument.as_deref(), AdminAction::Remove).await?;
            }
            Ok(())
        }
    }
}

async fn info(state: &AppState, chat_id: ChatId, user_id: UserId) -> Result<(), AppError> {
    let text = match state.orders().client(user_id).await? {
        Some(profile) => messages::client_info(&profile),
        None => messages::NOT_REGISTERED.to_string(),
    };
    reply(state, chat_id, text, None).await
}

/// Replies with the refusal and returns `false` for non-admins.
async fn require_admin(
    state: &AppState,
    chat_id: ChatId,
    user_id: UserId,
) -> Result<bool, AppError> {
    if state.admins().is_admin(user_id).await? {
        return Ok(true);
    }
    warn!(user_id = %user_id, "Admin command refused");
    reply(state, chat_id, messages::ADMIN_ONLY, None).await?;
    Ok(false)
}

async fn stats(state: &AppState, chat_id: ChatId, period: Option<&str>) -> Result<(), AppError> {
    let Ok(period) = ReportPeriod::parse(period, state.now().date()) else {
        return reply(state, chat_id, messages::STATS_BAD_FORMAT, None).await;
    };
    let label = period.label();

    let report = match aggregate_range(state.store(), &period).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Failed to aggregate orders");
            return reply(state, chat_id, messages::STATS_FETCH_FAILED, None).await;
        }
    };

    if report.is_empty() {
        return reply(state, chat_id, messages::no_orders_for_period(&label), None).await;
    }

    let csv = report.to_csv(&label);
    state
        .messenger()
        .send_document(chat_id, &period.file_name(), csv.into_bytes())
        .await?;
    info!(rows = report.rows.len(), "Report sent");
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum AdminAction {
    Add,
    Remove,
}

async fn change_admin(
    state: &AppState,
    chat_id: ChatId,
    argument: Option<&str>,
    action: AdminAction,
) -> Result<(), AppError> {
    let Some(argument) = argument else {
        let usage = match action {
            AdminAction::Add => messages::ADD_ADMIN_USAGE,
            AdminAction::Remove => messages::REMOVE_ADMIN_USAGE,
        };
        return reply(state, chat_id, usage, None).await;
    };
    let Ok(user_id) = argument.parse::<UserId>() else {
        return reply(state, chat_id, messages::INVALID_USER_ID, None).await;
    };

    let change = match action {
        AdminAction::Add => state.admins().add(user_id).await?,
        AdminAction::Remove => state.admins().remove(user_id).await?,
    };
    let text = match change {
        AdminChange::Added => messages::admin_added(user_id),
        AdminChange::Removed => messages::admin_removed(user_id),
        AdminChange::AlreadyAdmin => messages::ALREADY_ADMIN.to_string(),
        AdminChange::NotAdmin => messages::NOT_ADMIN.to_string(),
        AdminChange::Configured => messages::CONFIGURED_ADMIN.to_string(),
    };
    reply(state, chat_id, text, None).await
}
