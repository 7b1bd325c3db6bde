//! Per-user in-memory session state.
//!
//! Holds everything about a user that lives only in process memory: the
//! cart, the pending delivery date, the last committed order and the dialogue
//! state. A restart loses it; committed orders are recovered from the ledger.
//!
//! Each user's session sits behind its own async mutex, so events from one
//! user run strictly one after another while other users proceed in
//! parallel. A session that no longer carries anything is evicted after the
//! update that emptied it.

pub mod dialogue;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use krash_order_core::delivery::can_cancel;
use krash_order_core::{Cart, ChatId, MessageId, OrderId, UserId};

use crate::telegram::MessageRef;

pub use dialogue::{DialogueInput, DialogueState, Effect, ReplyKeyboard, Transition};

/// The most recently committed order, kept for the "cancel last order"
/// button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastOrderHandle {
    pub order_id: OrderId,
    /// Order lines and slot as shown in the confirmation.
    pub summary: String,
    pub delivery_at: NaiveDateTime,
    /// Staff notification per admin chat, for threading the cancellation.
    pub admin_messages: HashMap<ChatId, MessageId>,
}

/// Mutable state of one user.
#[derive(Debug, Default)]
pub struct UserSession {
    pub dialogue: DialogueState,
    pub cart: Cart,
    pub pending_date: Option<NaiveDate>,
    pub last_order: Option<LastOrderHandle>,
    /// Message currently showing the cart, dates or times.
    pub cart_message: Option<MessageRef>,
}

impl UserSession {
    /// True when dropping the session loses nothing the ledger cannot
    /// restore.
    #[must_use]
    pub fn is_idle(&self, now: NaiveDateTime) -> bool {
        self.dialogue == DialogueState::Idle
            && self.cart.is_empty()
            && self.pending_date.is_none()
            && self
                .last_order
                .as_ref()
                .is_none_or(|last| !can_cancel(last.delivery_at, now))
    }
}

/// Sessions keyed by user id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<UserId, Arc<Mutex<UserSession>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the session of `user_id`, creating it on first use.
    ///
    /// The map shard is released before awaiting the per-user mutex, so a
    /// slow user never blocks lookups for others.
    pub async fn lock(&self, user_id: UserId) -> OwnedMutexGuard<UserSession> {
        let session = Arc::clone(&self.sessions.entry(user_id).or_default());
        session.lock_owned().await
    }

    /// Drop the session of `user_id` if it is idle at `now` and no one else
    /// holds it. Returns whether it was removed.
    pub fn evict_idle(&self, user_id: UserId, now: NaiveDateTime) -> bool {
        self.sessions
            .remove_if(&user_id, |_, session| {
                Arc::strong_count(session) == 1
                    && session
                        .try_lock()
                        .is_ok_and(|session| session.is_idle(now))
            })
            .is_some()
    }

    /// Drop a user's session entirely.
    pub fn remove(&self, user_id: UserId) {
        self.sessions.remove(&user_id);
    }

    /// Number of users with a session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use krash_order_core::{Catalog, ProductId};

    #[tokio::test]
    async fn test_session_created_lazily_and_persists() {
        let store = SessionStore::new();
        assert!(store.is_empty());
        {
            let mut session = store.lock(UserId::new(1)).await;
            let product = Catalog::get(ProductId::new(1)).expect("exists");
            session.cart.add_or_increment(product, 2);
        }
        let session = store.lock(UserId::new(1)).await;
        assert_eq!(session.cart.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_same_user_is_serialized() {
        let store = Arc::new(SessionStore::new());
        let guard = store.lock(UserId::new(7)).await;

        let contender = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut session = store.lock(UserId::new(7)).await;
                session.pending_date = NaiveDate::from_ymd_opt(2025, 3, 10);
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.expect("task");

        let session = store.lock(UserId::new(7)).await;
        assert!(session.pending_date.is_some());
    }

    #[tokio::test]
    async fn test_other_users_not_blocked() {
        let store = SessionStore::new();
        let _held = store.lock(UserId::new(1)).await;
        let other = tokio::time::timeout(Duration::from_secs(1), store.lock(UserId::new(2))).await;
        assert!(other.is_ok());
    }

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 8)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid")
    }

    #[tokio::test]
    async fn test_evict_idle_drops_empty_session() {
        let store = SessionStore::new();
        drop(store.lock(UserId::new(1)).await);
        assert!(store.evict_idle(UserId::new(1), at(12)));
        assert!(store.is_empty());
        assert!(!store.evict_idle(UserId::new(1), at(12)));
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_sessions_with_state() {
        let store = SessionStore::new();
        {
            let mut session = store.lock(UserId::new(1)).await;
            let product = Catalog::get(ProductId::new(1)).expect("exists");
            session.cart.add_or_increment(product, 1);
        }
        store.lock(UserId::new(2)).await.dialogue = DialogueState::AwaitingOrganization;

        assert!(!store.evict_idle(UserId::new(1), at(12)));
        assert!(!store.evict_idle(UserId::new(2), at(12)));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_evict_idle_skips_held_session() {
        let store = SessionStore::new();
        let guard = store.lock(UserId::new(1)).await;
        assert!(!store.evict_idle(UserId::new(1), at(12)));
        drop(guard);
        assert!(store.evict_idle(UserId::new(1), at(12)));
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_cancellable_last_order() {
        let store = SessionStore::new();
        store.lock(UserId::new(1)).await.last_order = Some(LastOrderHandle {
            order_id: OrderId::new(1),
            summary: String::new(),
            delivery_at: at(20),
            admin_messages: HashMap::new(),
        });

        assert!(!store.evict_idle(UserId::new(1), at(12)));
        assert!(store.evict_idle(UserId::new(1), at(15)));
    }

    #[tokio::test]
    async fn test_remove_resets_state() {
        let store = SessionStore::new();
        store.lock(UserId::new(3)).await.pending_date = NaiveDate::from_ymd_opt(2025, 3, 10);
        store.remove(UserId::new(3));
        assert!(store.lock(UserId::new(3)).await.pending_date.is_none());
    }
}
