//! Order commit and cancellation.
//!
//! The service turns a user's cart and chosen slot into a ledger entry and
//! manages the cancellation window afterwards. It operates on a locked
//! [`UserSession`], so callers are responsible for per-user serialization.
//!
//! "Now" is always passed in by the caller and evaluated at the moment of
//! the request; nothing here caches it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{info, instrument, warn};

use krash_order_core::delivery::can_cancel;
use krash_order_core::{
    ClientProfile, DeliveryInterval, DeliverySlot, NameError, NewOrder, Order, OrderId,
    PartyName, UserId,
};

use super::notify::Notifier;
use crate::db::{RepositoryError, Store};
use crate::session::{LastOrderHandle, UserSession};
use crate::telegram::messages;

/// A requirement that must hold before an order can be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    NotRegistered,
    EmptyCart,
    DateNotSelected,
    UnknownInterval,
    /// The chosen slot has already started.
    SlotPassed,
}

/// Errors from ordering and registration operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Registration input failed validation.
    #[error("invalid input: {0}")]
    Validation(#[from] NameError),

    /// A step of the ordering flow was skipped.
    #[error("precondition failed: {0:?}")]
    Precondition(Precondition),

    /// The ledger could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    /// The cancellation cutoff has passed. Carries the order summary.
    #[error("cancellation cutoff has passed")]
    TooLate { summary: String },

    /// No such order for this user.
    #[error("order not found")]
    NotFound,

    /// The order is no longer active.
    #[error("order already cancelled")]
    AlreadyCancelled,
}

/// A successfully committed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub order_id: OrderId,
    pub summary: String,
    /// Whether the cancellation window is still open.
    pub can_cancel: bool,
}

/// A successfully cancelled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancelled {
    pub order_id: OrderId,
    pub summary: String,
}

/// Commits and cancels orders.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    notifier: Notifier,
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl OrderService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Validate and store a client profile, overwriting any previous one.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad name and `Persistence` if the profile
    /// cannot be stored.
    #[instrument(skip(self, organization, contact_person), fields(user_id = %user_id))]
    pub async fn register(
        &self,
        user_id: UserId,
        organization: &str,
        contact_person: &str,
        username: Option<String>,
    ) -> Result<ClientProfile, OrderError> {
        let profile = ClientProfile {
            user_id,
            organization: PartyName::parse(organization)?,
            contact_person: PartyName::parse(contact_person)?,
            username,
        };
        self.store.upsert_client(&profile).await?;
        info!("Client registered");
        Ok(profile)
    }

    /// Look up a registered client.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the lookup fails.
    pub async fn client(&self, user_id: UserId) -> Result<Option<ClientProfile>, OrderError> {
        Ok(self.store.get_client(user_id).await?)
    }

    /// Remember the delivery date chosen by the user.
    pub fn select_date(session: &mut UserSession, date: NaiveDate) {
        session.pending_date = Some(date);
    }

    /// Turn the session's cart and pending date plus `interval` into an
    /// order.
    ///
    /// Once the order is saved the cart and pending date are cleared and the
    /// order is remembered as the user's last order, before staff are
    /// notified. On any error the session is left untouched.
    ///
    /// # Errors
    ///
    /// - `Precondition` when no date is selected, the interval is unknown or
    ///   already started, the user is not registered or the cart is empty
    /// - `Persistence` when the ledger write fails
    #[instrument(skip(self, session, username), fields(user_id = %user_id))]
    pub async fn commit(
        &self,
        session: &mut UserSession,
        user_id: UserId,
        username: Option<&str>,
        interval: &str,
        now: NaiveDateTime,
    ) -> Result<Committed, OrderError> {
        let date = session
            .pending_date
            .ok_or(OrderError::Precondition(Precondition::DateNotSelected))?;
        let interval = DeliveryInterval::parse(interval)
            .map_err(|_| OrderError::Precondition(Precondition::UnknownInterval))?;
        let slot = DeliverySlot::new(date, interval);
        if slot.starts_at() <= now {
            return Err(OrderError::Precondition(Precondition::SlotPassed));
        }

        let mut profile = self
            .store
            .get_client(user_id)
            .await?
            .ok_or(OrderError::Precondition(Precondition::NotRegistered))?;
        if session.cart.is_empty() {
            return Err(OrderError::Precondition(Precondition::EmptyCart));
        }
        if let Some(current) = username {
            profile.username = Some(current.to_string());
        }

        let new_order = NewOrder {
            user_id,
            order_data: profile.snapshot(session.cart.to_order_items()),
            slot,
        };

        let order_id = self.store.save_order(&new_order).await?;
        info!(order_id = %order_id, "Order saved");

        let delivery_at = new_order.slot.starts_at();
        let summary = messages::order_summary(&new_order.order_data, &new_order.slot);

        // The order is in the ledger: settle the session before the next await.
        session.cart.clear();
        session.pending_date = None;
        session.last_order = Some(LastOrderHandle {
            order_id,
            summary: summary.clone(),
            delivery_at,
            admin_messages: HashMap::new(),
        });

        let admin_messages = self
            .notifier
            .order_placed(order_id, &new_order.order_data, &new_order.slot)
            .await;
        if let Some(last) = session.last_order.as_mut() {
            last.admin_messages = admin_messages;
        }

        Ok(Committed {
            order_id,
            summary,
            can_cancel: can_cancel(delivery_at, now),
        })
    }

    /// Cancel the user's most recent order.
    ///
    /// Uses the in-memory handle when present and falls back to the
    /// ledger's active order otherwise, so the button keeps working across
    /// restarts.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the user has no order to cancel
    /// - `TooLate` when the cutoff has passed; the ledger is not touched
    /// - `AlreadyCancelled` when the conditional update matched nothing
    /// - `Persistence` when the ledger cannot be read or written
    #[instrument(skip(self, session), fields(user_id = %user_id))]
    pub async fn cancel_last(
        &self,
        session: &mut UserSession,
        user_id: UserId,
        now: NaiveDateTime,
    ) -> Result<Cancelled, OrderError> {
        let handle = match session.last_order.clone() {
            Some(handle) => handle,
            None => {
                let order = self
                    .store
                    .get_active_order(user_id)
                    .await?
                    .ok_or(OrderError::NotFound)?;
                handle_from_order(&order)
            }
        };

        let cancelled = self.cancel_handle(&handle, now).await?;
        session.last_order = None;
        Ok(cancelled)
    }

    /// Cancel a specific order of the user, as offered under "my orders".
    ///
    /// # Errors
    ///
    /// Same as [`OrderService::cancel_last`]; an order belonging to another
    /// user is reported as `NotFound`.
    #[instrument(skip(self, session), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn cancel_by_id(
        &self,
        session: &mut UserSession,
        user_id: UserId,
        order_id: OrderId,
        now: NaiveDateTime,
    ) -> Result<Cancelled, OrderError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or(OrderError::NotFound)?;
        if !order.status.is_active() {
            return Err(OrderError::AlreadyCancelled);
        }

        let handle = match &session.last_order {
            Some(last) if last.order_id == order_id => last.clone(),
            _ => handle_from_order(&order),
        };

        let cancelled = self.cancel_handle(&handle, now).await?;
        if session
            .last_order
            .as_ref()
            .is_some_and(|last| last.order_id == order_id)
        {
            session.last_order = None;
        }
        Ok(cancelled)
    }

    async fn cancel_handle(
        &self,
        handle: &LastOrderHandle,
        now: NaiveDateTime,
    ) -> Result<Cancelled, OrderError> {
        if !can_cancel(handle.delivery_at, now) {
            info!(order_id = %handle.order_id, "Cancellation refused, cutoff passed");
            return Err(OrderError::TooLate {
                summary: handle.summary.clone(),
            });
        }

        if !self.store.cancel_order(handle.order_id).await? {
            warn!(order_id = %handle.order_id, "Order was not active, nothing cancelled");
            return Err(OrderError::AlreadyCancelled);
        }
        info!(order_id = %handle.order_id, "Order cancelled");

        self.notifier
            .order_cancelled(handle.order_id, &handle.summary, &handle.admin_messages)
            .await;

        Ok(Cancelled {
            order_id: handle.order_id,
            summary: handle.summary.clone(),
        })
    }

    /// The user's most recent active order, read from the ledger.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the ledger cannot be read.
    pub async fn active_order(&self, user_id: UserId) -> Result<Option<Order>, OrderError> {
        Ok(self.store.get_active_order(user_id).await?)
    }
}

fn handle_from_order(order: &Order) -> LastOrderHandle {
    LastOrderHandle {
        order_id: order.order_id,
        summary: messages::order_summary(&order.order_data, &order.slot()),
        delivery_at: order.delivery_at(),
        admin_messages: HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::services::admins::AdminDirectory;
    use crate::telegram::{
        InlineKeyboardMarkup, InlineQueryResultArticle, MessageRef, Messenger, RecordingMessenger,
        SendMessage, TelegramError,
    };
    use std::time::Duration;
    use krash_order_core::delivery::parse_date_key;
    use krash_order_core::{Catalog, ChatId, OrderStatus, ProductId};

    /// A chat transport whose calls never complete.
    struct StalledMessenger;

    #[async_trait::async_trait]
    impl Messenger for StalledMessenger {
        async fn send_message(&self, _: SendMessage) -> Result<MessageRef, TelegramError> {
            std::future::pending().await
        }

        async fn edit_message_text(
            &self,
            _: MessageRef,
            _: &str,
            _: Option<InlineKeyboardMarkup>,
        ) -> Result<(), TelegramError> {
            std::future::pending().await
        }

        async fn answer_callback_query(&self, _: &str, _: Option<&str>) -> Result<(), TelegramError> {
            std::future::pending().await
        }

        async fn answer_inline_query(
            &self,
            _: &str,
            _: Vec<InlineQueryResultArticle>,
        ) -> Result<(), TelegramError> {
            std::future::pending().await
        }

        async fn delete_message(&self, _: MessageRef) -> Result<(), TelegramError> {
            std::future::pending().await
        }

        async fn send_document(
            &self,
            _: ChatId,
            _: &str,
            _: Vec<u8>,
        ) -> Result<MessageRef, TelegramError> {
            std::future::pending().await
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        messenger: Arc<RecordingMessenger>,
        service: OrderService,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let admins = AdminDirectory::new(store.clone(), vec![ChatId::new(900)]);
        let service = OrderService::new(store.clone(), Notifier::new(messenger.clone(), admins));
        service
            .register(UserId::new(1), "ООО Рога", "Иванов Иван", None)
            .await
            .expect("registered");
        Fixture {
            store,
            messenger,
            service,
        }
    }

    fn at(date: &str, hour: u32) -> NaiveDateTime {
        parse_date_key(date)
            .expect("valid")
            .and_hms_opt(hour, 0, 0)
            .expect("valid")
    }

    fn filled_session() -> UserSession {
        let mut session = UserSession::default();
        let croissant = Catalog::get(ProductId::new(1)).expect("exists");
        let almond = Catalog::get(ProductId::new(2)).expect("exists");
        session.cart.add_or_increment(croissant, 2);
        session.cart.add_or_increment(almond, 1);
        session.pending_date = Some(parse_date_key("2025-03-10").expect("valid"));
        session
    }

    #[tokio::test]
    async fn test_commit_persists_snapshot_and_clears_session() {
        let f = fixture().await;
        let mut session = filled_session();

        let committed = f
            .service
            .commit(&mut session, UserId::new(1), Some("roga"), "6:00 - 8:00", at("2025-03-08", 12))
            .await
            .expect("committed");

        assert!(committed.can_cancel);
        assert!(session.cart.is_empty());
        assert!(session.pending_date.is_none());
        let handle = session.last_order.as_ref().expect("handle");
        assert_eq!(handle.order_id, committed.order_id);
        assert!(handle.admin_messages.contains_key(&ChatId::new(900)));

        let order = f
            .service
            .active_order(UserId::new(1))
            .await
            .expect("ok")
            .expect("active");
        assert_eq!(order.order_id, committed.order_id);
        let lines: Vec<_> = order
            .order_data
            .items
            .iter()
            .map(|i| (i.product.title.as_str(), i.quantity))
            .collect();
        assert_eq!(lines, vec![("Классический круассан", 2), ("Миндальный круассан", 1)]);
        assert_eq!(order.order_data.username.as_deref(), Some("roga"));
        assert_eq!(order.delivery_time.label(), "6:00 - 8:00");
    }

    #[tokio::test]
    async fn test_interrupted_notification_does_not_duplicate_order() {
        let store = Arc::new(MemoryStore::new());
        let admins = AdminDirectory::new(store.clone(), vec![ChatId::new(900)]);
        let service = OrderService::new(
            store.clone(),
            Notifier::new(Arc::new(StalledMessenger), admins),
        );
        service
            .register(UserId::new(1), "ООО Рога", "Иванов Иван", None)
            .await
            .expect("registered");
        let mut session = filled_session();
        let now = at("2025-03-08", 12);

        let interrupted = tokio::time::timeout(
            Duration::from_millis(100),
            service.commit(&mut session, UserId::new(1), None, "6:00 - 8:00", now),
        )
        .await;
        assert!(interrupted.is_err());
        assert_eq!(store.order_count().await, 1);
        assert!(session.cart.is_empty());
        assert!(session.pending_date.is_none());
        let handle = session.last_order.as_ref().expect("handle");
        assert!(handle.admin_messages.is_empty());

        let retry = tokio::time::timeout(
            Duration::from_millis(100),
            service.commit(&mut session, UserId::new(1), None, "6:00 - 8:00", now),
        )
        .await
        .expect("fails before notifying");
        assert!(matches!(
            retry,
            Err(OrderError::Precondition(Precondition::DateNotSelected))
        ));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_commit_without_date_changes_nothing() {
        let f = fixture().await;
        let mut session = filled_session();
        session.pending_date = None;

        let err = f
            .service
            .commit(&mut session, UserId::new(1), None, "9:00 - 11:00", at("2025-03-08", 12))
            .await
            .expect_err("no date");

        assert!(matches!(
            err,
            OrderError::Precondition(Precondition::DateNotSelected)
        ));
        assert_eq!(session.cart.len(), 2);
        assert_eq!(f.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_requires_registration_and_items() {
        let f = fixture().await;
        let mut session = filled_session();
        let err = f
            .service
            .commit(&mut session, UserId::new(2), None, "6:00 - 8:00", at("2025-03-08", 12))
            .await
            .expect_err("unregistered");
        assert!(matches!(err, OrderError::Precondition(Precondition::NotRegistered)));

        session.cart.clear();
        let err = f
            .service
            .commit(&mut session, UserId::new(1), None, "6:00 - 8:00", at("2025-03-08", 12))
            .await
            .expect_err("empty");
        assert!(matches!(err, OrderError::Precondition(Precondition::EmptyCart)));

        let mut session = filled_session();
        let err = f
            .service
            .commit(&mut session, UserId::new(1), None, "5:00 - 7:00", at("2025-03-08", 12))
            .await
            .expect_err("interval");
        assert!(matches!(err, OrderError::Precondition(Precondition::UnknownInterval)));
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_cart() {
        let f = fixture().await;
        let mut session = filled_session();
        f.store.set_unavailable(true);

        let err = f
            .service
            .commit(&mut session, UserId::new(1), None, "6:00 - 8:00", at("2025-03-08", 12))
            .await
            .expect_err("db down");

        assert!(matches!(err, OrderError::Persistence(_)));
        assert_eq!(session.cart.len(), 2);
        assert!(session.pending_date.is_some());
        assert!(session.last_order.is_none());
        assert!(f.messenger.outgoing().await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_rejects_started_slot() {
        let f = fixture().await;
        let mut session = filled_session();

        let err = f
            .service
            .commit(&mut session, UserId::new(1), None, "6:00 - 8:00", at("2025-03-10", 6))
            .await
            .expect_err("started");
        assert!(matches!(err, OrderError::Precondition(Precondition::SlotPassed)));
        assert_eq!(session.cart.len(), 2);
        assert!(session.pending_date.is_some());
        assert_eq!(f.store.order_count().await, 0);

        f.service
            .commit(&mut session, UserId::new(1), None, "11:00 - 13:00", at("2025-03-10", 6))
            .await
            .expect("later slot the same day");
    }

    #[tokio::test]
    async fn test_commit_inside_cutoff_offers_no_cancel() {
        let f = fixture().await;
        let mut session = filled_session();
        let committed = f
            .service
            .commit(&mut session, UserId::new(1), None, "6:00 - 8:00", at("2025-03-10", 0))
            .await
            .expect("committed");
        assert!(!committed.can_cancel);
    }

    #[tokio::test]
    async fn test_cancel_last_succeeds_once() {
        let f = fixture().await;
        let mut session = filled_session();
        let now = at("2025-03-08", 12);
        let committed = f
            .service
            .commit(&mut session, UserId::new(1), None, "6:00 - 8:00", now)
            .await
            .expect("committed");

        let cancelled = f
            .service
            .cancel_last(&mut session, UserId::new(1), now)
            .await
            .expect("cancelled");
        assert_eq!(cancelled.order_id, committed.order_id);
        assert!(session.last_order.is_none());

        let err = f
            .service
            .cancel_last(&mut session, UserId::new(1), now)
            .await
            .expect_err("second attempt");
        assert!(matches!(err, OrderError::NotFound));

        let err = f
            .service
            .cancel_by_id(&mut session, UserId::new(1), committed.order_id, now)
            .await
            .expect_err("second attempt by id");
        assert!(matches!(err, OrderError::AlreadyCancelled));

        let order = f.store.get_order(committed.order_id).await.expect("ok").expect("exists");
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_too_late_leaves_order_active() {
        let f = fixture().await;
        let mut session = filled_session();
        let committed = f
            .service
            .commit(&mut session, UserId::new(1), None, "6:00 - 8:00", at("2025-03-08", 12))
            .await
            .expect("committed");

        let err = f
            .service
            .cancel_last(&mut session, UserId::new(1), at("2025-03-10", 0))
            .await
            .expect_err("too late");
        assert!(matches!(err, OrderError::TooLate { .. }));
        assert!(session.last_order.is_some());

        let order = f.store.get_order(committed.order_id).await.expect("ok").expect("exists");
        assert_eq!(order.status, OrderStatus::Active);
    }

    #[tokio::test]
    async fn test_cancel_falls_back_to_ledger_after_restart() {
        let f = fixture().await;
        let mut session = filled_session();
        let now = at("2025-03-08", 12);
        let committed = f
            .service
            .commit(&mut session, UserId::new(1), None, "6:00 - 8:00", now)
            .await
            .expect("committed");

        let mut fresh = UserSession::default();
        let cancelled = f
            .service
            .cancel_last(&mut fresh, UserId::new(1), now)
            .await
            .expect("cancelled");
        assert_eq!(cancelled.order_id, committed.order_id);
    }

    #[tokio::test]
    async fn test_cancel_by_id_rejects_foreign_order() {
        let f = fixture().await;
        let mut session = filled_session();
        let now = at("2025-03-08", 12);
        let committed = f
            .service
            .commit(&mut session, UserId::new(1), None, "6:00 - 8:00", now)
            .await
            .expect("committed");

        let mut other = UserSession::default();
        let err = f
            .service
            .cancel_by_id(&mut other, UserId::new(2), committed.order_id, now)
            .await
            .expect_err("foreign");
        assert!(matches!(err, OrderError::NotFound));
    }

    #[tokio::test]
    async fn test_register_validates_names() {
        let f = fixture().await;
        let err = f
            .service
            .register(UserId::new(3), "Рога123", "Иванов Иван", None)
            .await
            .expect_err("invalid");
        assert!(matches!(err, OrderError::Validation(NameError::InvalidCharacters)));
        assert!(f.service.client(UserId::new(3)).await.expect("ok").is_none());
    }
}
