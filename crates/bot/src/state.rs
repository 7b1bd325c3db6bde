//! Application state shared across handlers.

use std::sync::{Arc, RwLock};

use chrono::{FixedOffset, NaiveDateTime, Utc};
use secrecy::SecretString;

use krash_order_core::ChatId;

use crate::config::BotConfig;
use crate::db::Store;
use crate::services::{AdminDirectory, Notifier, OrderService};
use crate::session::SessionStore;
use crate::telegram::Messenger;

/// Runtime settings the handlers read.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub admin_chat_ids: Vec<ChatId>,
    pub manager_url: String,
    pub utc_offset: FixedOffset,
    pub webhook_secret: Option<SecretString>,
}

impl BotSettings {
    #[must_use]
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            admin_chat_ids: config.admin_chat_ids.clone(),
            manager_url: config.manager_url.clone(),
            utc_offset: config.utc_offset,
            webhook_secret: config.telegram.webhook_secret.clone(),
        }
    }
}

/// Business-local wall clock.
///
/// Reads the system time unless frozen, which scenario tests use to pin
/// "now" around the cancellation cutoff.
#[derive(Debug)]
pub struct Clock {
    offset: FixedOffset,
    frozen: RwLock<Option<NaiveDateTime>>,
}

impl Clock {
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            frozen: RwLock::new(None),
        }
    }

    /// Current local time, read fresh on every call.
    #[must_use]
    pub fn now(&self) -> NaiveDateTime {
        let frozen = self.frozen.read().ok().and_then(|guard| *guard);
        frozen.unwrap_or_else(|| Utc::now().with_timezone(&self.offset).naive_local())
    }

    /// Pin `now()` to `at`.
    pub fn freeze(&self, at: NaiveDateTime) {
        if let Ok(mut frozen) = self.frozen.write() {
            *frozen = Some(at);
        }
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    settings: BotSettings,
    clock: Clock,
    store: Arc<dyn Store>,
    messenger: Arc<dyn Messenger>,
    sessions: SessionStore,
    admins: AdminDirectory,
    orders: OrderService,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("settings", &self.inner.settings)
            .field("sessions", &self.inner.sessions.len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the services over a store and a messenger.
    #[must_use]
    pub fn new(
        settings: BotSettings,
        store: Arc<dyn Store>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let admins = AdminDirectory::new(Arc::clone(&store), settings.admin_chat_ids.clone());
        let notifier = Notifier::new(Arc::clone(&messenger), admins.clone());
        let orders = OrderService::new(Arc::clone(&store), notifier);

        Self {
            inner: Arc::new(AppStateInner {
                clock: Clock::new(settings.utc_offset),
                settings,
                store,
                messenger,
                sessions: SessionStore::new(),
                admins,
                orders,
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &BotSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// Shorthand for `clock().now()`.
    #[must_use]
    pub fn now(&self) -> NaiveDateTime {
        self.inner.clock.now()
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn messenger(&self) -> &dyn Messenger {
        self.inner.messenger.as_ref()
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    #[must_use]
    pub fn admins(&self) -> &AdminDirectory {
        &self.inner.admins
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_frozen_clock() {
        let clock = Clock::new(FixedOffset::east_opt(3 * 3600).expect("valid"));
        let at = NaiveDate::from_ymd_opt(2025, 3, 8)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid");
        clock.freeze(at);
        assert_eq!(clock.now(), at);
    }
}
