//! Staff directory.
//!
//! Admins are the union of the chats configured in `ADMIN_CHAT_ID` and the
//! users stored in the `admins` table. Configured admins cannot be removed at
//! runtime.

use std::sync::Arc;

use tracing::{error, info, instrument};

use krash_order_core::{ChatId, UserId};

use crate::db::{RepositoryError, Store};

/// Outcome of an add or remove request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminChange {
    Added,
    AlreadyAdmin,
    Removed,
    NotAdmin,
    /// The user is a configured admin and cannot be removed.
    Configured,
}

/// Resolves who is staff and where staff notifications go.
#[derive(Clone)]
pub struct AdminDirectory {
    store: Arc<dyn Store>,
    configured: Vec<ChatId>,
}

impl std::fmt::Debug for AdminDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminDirectory")
            .field("configured", &self.configured)
            .finish_non_exhaustive()
    }
}

impl AdminDirectory {
    #[must_use]
    pub const fn new(store: Arc<dyn Store>, configured: Vec<ChatId>) -> Self {
        Self { store, configured }
    }

    fn is_configured(&self, user_id: UserId) -> bool {
        self.configured.contains(&ChatId::private(user_id))
    }

    /// Whether `user_id` may run admin commands.
    ///
    /// # Errors
    ///
    /// Returns error if the admins table cannot be read.
    pub async fn is_admin(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        if self.is_configured(user_id) {
            return Ok(true);
        }
        self.store.is_admin(user_id).await
    }

    /// Grant admin rights to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns error if the admins table cannot be written.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn add(&self, user_id: UserId) -> Result<AdminChange, RepositoryError> {
        if self.is_configured(user_id) {
            return Ok(AdminChange::AlreadyAdmin);
        }
        if self.store.add_admin(user_id).await? {
            info!("Admin added");
            Ok(AdminChange::Added)
        } else {
            Ok(AdminChange::AlreadyAdmin)
        }
    }

    /// Revoke admin rights from `user_id`.
    ///
    /// # Errors
    ///
    /// Returns error if the admins table cannot be written.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn remove(&self, user_id: UserId) -> Result<AdminChange, RepositoryError> {
        if self.is_configured(user_id) {
            return Ok(AdminChange::Configured);
        }
        if self.store.remove_admin(user_id).await? {
            info!("Admin removed");
            Ok(AdminChange::Removed)
        } else {
            Ok(AdminChange::NotAdmin)
        }
    }

    /// Every chat that receives staff notifications, configured chats first.
    ///
    /// A failure to read the admins table is logged and the configured chats
    /// are still returned.
    pub async fn recipients(&self) -> Vec<ChatId> {
        let mut chats = self.configured.clone();
        match self.store.list_admins().await {
            Ok(stored) => {
                for chat in stored.into_iter().map(ChatId::private) {
                    if !chats.contains(&chat) {
                        chats.push(chat);
                    }
                }
            }
            Err(e) => error!(error = %e, "Failed to load stored admins"),
        }
        chats
    }
}
