//! Staff notifications.
//!
//! Every send is independent: a failing chat is logged and skipped, and never
//! affects the order that triggered the notification.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use krash_order_core::{ChatId, DeliverySlot, MessageId, OrderId, OrderSnapshot};

use super::admins::AdminDirectory;
use crate::telegram::{Messenger, SendMessage, messages};

/// Fans staff notifications out to every admin chat.
#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn Messenger>,
    admins: AdminDirectory,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("admins", &self.admins)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    #[must_use]
    pub fn new(messenger: Arc<dyn Messenger>, admins: AdminDirectory) -> Self {
        Self { messenger, admins }
    }

    /// Send `build(chat)` to every admin chat.
    ///
    /// Returns the message sent to each chat that accepted it.
    async fn broadcast<F>(&self, build: F) -> HashMap<ChatId, MessageId>
    where
        F: Fn(ChatId) -> SendMessage + Send + Sync,
    {
        let recipients = self.admins.recipients().await;
        if recipients.is_empty() {
            warn!("No admin chats configured, notification dropped");
            return HashMap::new();
        }

        let mut delivered = HashMap::with_capacity(recipients.len());
        let mut failed = 0_usize;
        for chat_id in recipients {
            match self.messenger.send_message(build(chat_id)).await {
                Ok(sent) => {
                    delivered.insert(chat_id, sent.message_id);
                }
                Err(e) => {
                    failed += 1;
                    error!(chat_id = %chat_id, error = %e, "Failed to notify admin chat");
                }
            }
        }

        info!(
            delivered = delivered.len(),
            failed, "Staff notification fan-out finished"
        );
        delivered
    }

    /// Announce a new order. Returns the notification message per chat.
    #[instrument(skip(self, snapshot, slot), fields(order_id = %order_id))]
    pub async fn order_placed(
        &self,
        order_id: OrderId,
        snapshot: &OrderSnapshot,
        slot: &DeliverySlot,
    ) -> HashMap<ChatId, MessageId> {
        let text = messages::admin_new_order(order_id, snapshot, slot);
        let keyboard = messages::admin_new_order_keyboard(snapshot.username.as_deref());

        self.broadcast(|chat_id| {
            let message = SendMessage::new(chat_id, text.clone()).silent();
            match &keyboard {
                Some(keyboard) => message.with_markup(keyboard.clone()),
                None => message,
            }
        })
        .await
    }

    /// Announce a cancellation, threading under the original notification
    /// where one is known.
    #[instrument(skip(self, summary, threads), fields(order_id = %order_id))]
    pub async fn order_cancelled(
        &self,
        order_id: OrderId,
        summary: &str,
        threads: &HashMap<ChatId, MessageId>,
    ) {
        let text = messages::admin_order_cancelled(order_id, summary);

        self.broadcast(|chat_id| {
            let message = SendMessage::new(chat_id, text.clone()).silent();
            match threads.get(&chat_id) {
                Some(message_id) => message.replying_to(*message_id),
                None => message,
            }
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::telegram::{Outgoing, RecordingMessenger};
    use krash_order_core::delivery::parse_date_key;
    use krash_order_core::DeliveryInterval;

    fn setup(admins: Vec<ChatId>) -> (Arc<RecordingMessenger>, Notifier) {
        let messenger = Arc::new(RecordingMessenger::new());
        let store = Arc::new(MemoryStore::new());
        let notifier = Notifier::new(messenger.clone(), AdminDirectory::new(store, admins));
        (messenger, notifier)
    }

    fn snapshot(username: Option<&str>) -> OrderSnapshot {
        OrderSnapshot {
            organization: "ООО Рога".to_string(),
            contact_person: "Иванов Иван".to_string(),
            username: username.map(str::to_string),
            items: Vec::new(),
        }
    }

    fn slot() -> DeliverySlot {
        DeliverySlot::new(
            parse_date_key("2025-03-10").expect("valid"),
            DeliveryInterval::parse("6:00 - 8:00").expect("known"),
        )
    }

    #[tokio::test]
    async fn test_one_failing_chat_does_not_block_others() {
        let (messenger, notifier) = setup(vec![ChatId::new(1), ChatId::new(2), ChatId::new(3)]);
        messenger.fail_chat(ChatId::new(2)).await;

        let delivered = notifier
            .order_placed(OrderId::new(5), &snapshot(Some("roga")), &slot())
            .await;

        assert_eq!(delivered.len(), 2);
        assert!(delivered.contains_key(&ChatId::new(1)));
        assert!(delivered.contains_key(&ChatId::new(3)));
        assert!(!delivered.contains_key(&ChatId::new(2)));
    }

    #[tokio::test]
    async fn test_cancellation_threads_per_chat() {
        let (messenger, notifier) = setup(vec![ChatId::new(1), ChatId::new(2)]);
        let threads = HashMap::from([(ChatId::new(1), MessageId::new(77))]);

        notifier
            .order_cancelled(OrderId::new(5), "summary", &threads)
            .await;

        let sent = messenger.outgoing().await;
        assert_eq!(sent.len(), 2);
        for outgoing in sent {
            let Outgoing::Message { sent, request } = outgoing else {
                panic!("expected message");
            };
            assert!(request.disable_notification);
            let reply_to = request.reply_parameters.map(|r| r.message_id);
            if sent.chat_id == ChatId::new(1) {
                assert_eq!(reply_to, Some(MessageId::new(77)));
            } else {
                assert_eq!(reply_to, None);
            }
        }
    }

    #[tokio::test]
    async fn test_no_admins_sends_nothing() {
        let (messenger, notifier) = setup(Vec::new());
        let delivered = notifier
            .order_placed(OrderId::new(1), &snapshot(None), &slot())
            .await;
        assert!(delivered.is_empty());
        assert!(messenger.outgoing().await.is_empty());
    }
}
