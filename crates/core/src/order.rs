//! Client profiles and committed orders.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ProductSnapshot;
use crate::delivery::{DeliveryInterval, DeliverySlot};
use crate::types::{OrderId, OrderStatus, PartyName, UserId};

/// A registered organization and the person placing orders for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub user_id: UserId,
    pub organization: PartyName,
    pub contact_person: PartyName,
    /// Chat username without the leading `@`, if the user has one.
    pub username: Option<String>,
}

impl ClientProfile {
    /// Freeze the profile together with the given items.
    #[must_use]
    pub fn snapshot(&self, items: Vec<OrderItem>) -> OrderSnapshot {
        OrderSnapshot {
            organization: self.organization.as_str().to_owned(),
            contact_person: self.contact_person.as_str().to_owned(),
            username: self.username.clone(),
            items,
        }
    }
}

/// One product line of a committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product: ProductSnapshot,
    pub quantity: u32,
}

/// Frozen copy of client and cart data stored with an order.
///
/// Stored as JSON in the ledger; nothing here references live catalog or
/// profile state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub organization: String,
    pub contact_person: String,
    #[serde(default)]
    pub username: Option<String>,
    pub items: Vec<OrderItem>,
}

impl OrderSnapshot {
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

/// An order ready to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub order_data: OrderSnapshot,
    pub slot: DeliverySlot,
}

/// A ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub order_data: OrderSnapshot,
    pub delivery_date: NaiveDate,
    pub delivery_time: DeliveryInterval,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn slot(&self) -> DeliverySlot {
        DeliverySlot::new(self.delivery_date, self.delivery_time.clone())
    }

    /// Moment the delivery interval starts, in business-local time.
    #[must_use]
    pub fn delivery_at(&self) -> NaiveDateTime {
        self.slot().starts_at()
    }

    /// Active and still before the cancellation cutoff.
    #[must_use]
    pub fn is_cancellable_at(&self, now: NaiveDateTime) -> bool {
        self.status.is_active() && self.slot().can_cancel_at(now)
    }
}
