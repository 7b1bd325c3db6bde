//! Inline keyboard presses.
//!
//! Every screen of the ordering flow lives in a single message that is edited
//! in place. The callback is always answered, with a toast when the press was
//! refused.

use chrono::{Days, NaiveDate, NaiveDateTime};
use tracing::{error, info, instrument, warn};

use krash_order_core::delivery::{DELIVERY_WINDOW_DAYS, available_dates, available_time_intervals};
use krash_order_core::{Direction, QuantityChange};

use crate::error::AppError;
use crate::services::{Cancelled, OrderError, OrderService, Precondition};
use crate::session::UserSession;
use crate::state::AppState;
use crate::telegram::{
    CallbackAction, CallbackQuery, InlineKeyboardMarkup, MessageRef, User, messages,
};

const MIN_QUANTITY_NOTICE: &str = "Минимальное количество: 1";
const DATE_OUT_OF_RANGE: &str = "Эта дата недоступна. Выберите дату из списка.";

#[instrument(skip(state, query), fields(user_id = %query.from.id, data = ?query.data))]
pub(super) async fn handle(state: &AppState, query: &CallbackQuery) -> Result<(), AppError> {
    let action = query.data.as_deref().and_then(CallbackAction::parse);
    let target = query.message.as_ref().map(|m| m.reference());

    let notice = match (action, target) {
        (Some(action), Some(target)) => {
            let mut session = state.sessions().lock(query.from.id).await;
            apply(state, &mut session, &query.from, target, action).await?
        }
        (None, _) => {
            warn!("Unknown callback data");
            None
        }
        (Some(_), None) => {
            warn!("Callback without an accessible message");
            None
        }
    };

    if let Err(e) = state
        .messenger()
        .answer_callback_query(&query.id, notice)
        .await
    {
        warn!(error = %e, "Failed to answer callback query");
    }
    Ok(())
}

/// Execute `action` against the session. Returns the toast to show, if any.
async fn apply(
    state: &AppState,
    session: &mut UserSession,
    user: &User,
    target: MessageRef,
    action: CallbackAction,
) -> Result<Option<&'static str>, AppError> {
    let now = state.now();
    let screen = Screen { state, target };

    match action {
        CallbackAction::PrevItem | CallbackAction::NextItem => {
            let direction = if action == CallbackAction::PrevItem {
                Direction::Prev
            } else {
                Direction::Next
            };
            if session.cart.move_cursor(direction) {
                screen.cart(session).await?;
            }
        }
        CallbackAction::Increase | CallbackAction::Decrease => {
            let delta = if action == CallbackAction::Increase { 1 } else { -1 };
            match session.cart.set_quantity_delta(delta) {
                QuantityChange::Changed(_) | QuantityChange::NoLine => screen.cart(session).await?,
                QuantityChange::Rejected => return Ok(Some(MIN_QUANTITY_NOTICE)),
            }
        }
        CallbackAction::RemoveItem => {
            if let Some(removed) = session.cart.remove_current() {
                info!(product_id = %removed.product.id, "Cart line removed");
            }
            screen.cart(session).await?;
        }
        CallbackAction::BackToCart => screen.cart(session).await?,
        CallbackAction::SelectDeliveryDate | CallbackAction::BackToDates => {
            screen.dates(session, now).await?;
        }
        CallbackAction::DeliveryDate(date) => {
            if !is_selectable(date, now) {
                screen.dates(session, now).await?;
                return Ok(Some(DATE_OUT_OF_RANGE));
            }
            OrderService::select_date(session, date);
            screen
                .edit(
                    messages::CHOOSE_TIME,
                    Some(messages::times_keyboard(&available_time_intervals())),
                )
                .await?;
        }
        CallbackAction::DeliveryTime(interval) => {
            return commit(state, session, user, screen, &interval, now).await;
        }
        CallbackAction::CancelLastOrder => {
            let outcome = state.orders().cancel_last(session, user.id, now).await;
            let retry = messages::order_confirmation_keyboard(true, &state.settings().manager_url);
            show_cancellation(state, screen, outcome, retry).await?;
        }
        CallbackAction::CancelOrder(order_id) => {
            let outcome = state
                .orders()
                .cancel_by_id(session, user.id, order_id, now)
                .await;
            let retry = messages::active_order_keyboard(order_id, true);
            show_cancellation(state, screen, outcome, retry).await?;
        }
        CallbackAction::BackToMenu => {
            screen
                .edit(messages::MAIN_MENU, Some(messages::main_menu_keyboard()))
                .await?;
        }
        CallbackAction::Catalog => {
            screen
                .edit(messages::CATALOG, Some(messages::open_menu_keyboard()))
                .await?;
        }
        CallbackAction::About => {
            screen
                .edit(messages::ABOUT, Some(messages::back_to_menu_keyboard()))
                .await?;
        }
        CallbackAction::MyOrders => match state.orders().active_order(user.id).await? {
            Some(order) => {
                let keyboard =
                    messages::active_order_keyboard(order.order_id, order.is_cancellable_at(now));
                screen
                    .edit(&messages::active_order(&order), Some(keyboard))
                    .await?;
            }
            None => {
                screen
                    .edit(
                        messages::NO_ACTIVE_ORDERS,
                        Some(messages::back_to_menu_keyboard()),
                    )
                    .await?;
            }
        },
    }
    Ok(None)
}

/// Dates offered by the picker, plus today for pickers rendered yesterday.
/// Intervals of today that have already started are refused at commit.
fn is_selectable(date: NaiveDate, now: NaiveDateTime) -> bool {
    let today = now.date();
    today
        .checked_add_days(Days::new(DELIVERY_WINDOW_DAYS))
        .is_some_and(|last| (today..=last).contains(&date))
}

async fn commit(
    state: &AppState,
    session: &mut UserSession,
    user: &User,
    screen: Screen<'_>,
    interval: &str,
    now: NaiveDateTime,
) -> Result<Option<&'static str>, AppError> {
    let outcome = state
        .orders()
        .commit(session, user.id, user.username.as_deref(), interval, now)
        .await;

    match outcome {
        Ok(committed) => {
            session.cart_message = None;
            screen
                .edit(
                    &messages::order_confirmation(&committed.summary, committed.can_cancel),
                    Some(messages::order_confirmation_keyboard(
                        committed.can_cancel,
                        &state.settings().manager_url,
                    )),
                )
                .await?;
        }
        Err(OrderError::Precondition(Precondition::DateNotSelected)) => {
            return Ok(Some(messages::DATE_NOT_SELECTED));
        }
        Err(OrderError::Precondition(Precondition::UnknownInterval)) => {
            return Ok(Some(messages::UNKNOWN_INTERVAL));
        }
        Err(OrderError::Precondition(Precondition::SlotPassed)) => {
            return Ok(Some(messages::SLOT_PASSED));
        }
        Err(OrderError::Precondition(Precondition::NotRegistered)) => {
            screen.edit(messages::REGISTRATION_REQUIRED, None).await?;
        }
        Err(OrderError::Precondition(Precondition::EmptyCart)) => {
            screen.edit(messages::CART_EMPTY, None).await?;
        }
        Err(OrderError::Persistence(e)) => {
            error!(error = %e, "Failed to save order");
            screen
                .edit(
                    messages::SAVE_FAILED,
                    Some(messages::times_keyboard(&available_time_intervals())),
                )
                .await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(None)
}

/// Show the result of a cancel press. `retry` is the keyboard offered again
/// when the ledger could not be reached.
async fn show_cancellation(
    state: &AppState,
    screen: Screen<'_>,
    outcome: Result<Cancelled, OrderError>,
    retry: InlineKeyboardMarkup,
) -> Result<(), AppError> {
    match outcome {
        Ok(cancelled) => {
            screen
                .edit(&messages::order_cancelled(&cancelled.summary), None)
                .await
        }
        Err(OrderError::TooLate { summary }) => {
            screen
                .edit(
                    &messages::cancel_too_late(&summary),
                    Some(messages::manager_keyboard(&state.settings().manager_url)),
                )
                .await
        }
        Err(OrderError::NotFound) => screen.edit(messages::NO_ORDER_TO_CANCEL, None).await,
        Err(OrderError::AlreadyCancelled) => screen.edit(messages::CANCEL_FAILED, None).await,
        Err(OrderError::Persistence(e)) => {
            error!(error = %e, "Failed to cancel order");
            screen.edit(messages::CANCEL_UNAVAILABLE, Some(retry)).await
        }
        Err(e) => Err(e.into()),
    }
}

/// The message being edited.
#[derive(Clone, Copy)]
struct Screen<'a> {
    state: &'a AppState,
    target: MessageRef,
}

impl Screen<'_> {
    async fn edit(self, text: &str, markup: Option<InlineKeyboardMarkup>) -> Result<(), AppError> {
        match self
            .state
            .messenger()
            .edit_message_text(self.target, text, markup)
            .await
        {
            Err(e) if e.is_not_modified() => Ok(()),
            other => Ok(other?),
        }
    }

    async fn cart(self, session: &mut UserSession) -> Result<(), AppError> {
        session.cart_message = Some(self.target);
        let snapshot = session.cart.snapshot();
        let markup = (!snapshot.is_empty())
            .then(|| messages::cart_keyboard(&self.state.settings().manager_url));
        self.edit(&messages::cart(&snapshot), markup).await
    }

    async fn dates(self, session: &mut UserSession, now: NaiveDateTime) -> Result<(), AppError> {
        session.cart_message = Some(self.target);
        if session.cart.is_empty() {
            return self.edit(messages::CART_EMPTY, None).await;
        }
        self.edit(
            messages::CHOOSE_DATE,
            Some(messages::dates_keyboard(&available_dates(now))),
        )
        .await
    }
}
