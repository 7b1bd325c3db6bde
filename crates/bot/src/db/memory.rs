//! In-process [`Store`] used by tests and local runs without Postgres.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;

use krash_order_core::{ClientProfile, NewOrder, Order, OrderId, OrderStatus, UserId};

use super::{RepositoryError, Store};

#[derive(Debug, Default)]
struct Tables {
    clients: HashMap<UserId, ClientProfile>,
    admins: BTreeSet<UserId>,
    orders: BTreeMap<OrderId, Order>,
    next_order_id: i32,
}

/// Memory-backed store with the same semantics as [`super::PgStore`].
///
/// [`MemoryStore::set_unavailable`] makes every call fail, which lets tests
/// exercise the persistence-error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated database outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of orders in the ledger, in any status.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_client(&self, user_id: UserId) -> Result<Option<ClientProfile>, RepositoryError> {
        self.check()?;
        Ok(self.tables.read().await.clients.get(&user_id).cloned())
    }

    async fn upsert_client(&self, profile: &ClientProfile) -> Result<(), RepositoryError> {
        self.check()?;
        self.tables
            .write()
            .await
            .clients
            .insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn save_order(&self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        tables.next_order_id += 1;
        let order_id = OrderId::new(tables.next_order_id);
        tables.orders.insert(
            order_id,
            Order {
                order_id,
                user_id: order.user_id,
                order_data: order.order_data.clone(),
                delivery_date: order.slot.date,
                delivery_time: order.slot.interval.clone(),
                status: OrderStatus::Active,
                created_at: Utc::now(),
            },
        );
        Ok(order_id)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        self.check()?;
        Ok(self.tables.read().await.orders.get(&order_id).cloned())
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<bool, RepositoryError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(&order_id) {
            Some(order) if order.status.is_active() => {
                order.status = OrderStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_active_order(&self, user_id: UserId) -> Result<Option<Order>, RepositoryError> {
        self.check()?;
        let tables = self.tables.read().await;
        // ids increase with insertion, so the last match is the newest
        Ok(tables
            .orders
            .values()
            .rev()
            .find(|o| o.user_id == user_id && o.status.is_active())
            .cloned())
    }

    async fn orders_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Order>, RepositoryError> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.delivery_date >= start && o.delivery_date <= end)
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.delivery_date, o.order_id));
        Ok(orders)
    }

    async fn is_admin(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        self.check()?;
        Ok(self.tables.read().await.admins.contains(&user_id))
    }

    async fn add_admin(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        self.check()?;
        Ok(self.tables.write().await.admins.insert(user_id))
    }

    async fn remove_admin(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        self.check()?;
        Ok(self.tables.write().await.admins.remove(&user_id))
    }

    async fn list_admins(&self) -> Result<Vec<UserId>, RepositoryError> {
        self.check()?;
        Ok(self.tables.read().await.admins.iter().copied().collect())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krash_order_core::delivery::parse_date_key;
    use krash_order_core::{DeliveryInterval, DeliverySlot, OrderSnapshot};

    fn new_order(user: i64, date: &str) -> NewOrder {
        NewOrder {
            user_id: UserId::new(user),
            order_data: OrderSnapshot {
                organization: "Рога".to_string(),
                contact_person: "Иван".to_string(),
                username: None,
                items: Vec::new(),
            },
            slot: DeliverySlot::new(
                parse_date_key(date).expect("valid"),
                DeliveryInterval::parse("6:00 - 8:00").expect("known"),
            ),
        }
    }

    #[tokio::test]
    async fn test_cancel_is_conditional() {
        let store = MemoryStore::new();
        let id = store.save_order(&new_order(1, "2025-03-10")).await.expect("saved");
        assert!(store.cancel_order(id).await.expect("ok"));
        assert!(!store.cancel_order(id).await.expect("ok"));
        assert!(!store.cancel_order(OrderId::new(999)).await.expect("ok"));
        let order = store.get_order(id).await.expect("ok").expect("exists");
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_active_order_is_latest() {
        let store = MemoryStore::new();
        let first = store.save_order(&new_order(1, "2025-03-10")).await.expect("saved");
        let second = store.save_order(&new_order(1, "2025-03-11")).await.expect("saved");
        store.save_order(&new_order(2, "2025-03-12")).await.expect("saved");

        let active = store.get_active_order(UserId::new(1)).await.expect("ok");
        assert_eq!(active.map(|o| o.order_id), Some(second));

        store.cancel_order(second).await.expect("ok");
        let active = store.get_active_order(UserId::new(1)).await.expect("ok");
        assert_eq!(active.map(|o| o.order_id), Some(first));
    }

    #[tokio::test]
    async fn test_range_is_inclusive() {
        let store = MemoryStore::new();
        for date in ["2025-03-09", "2025-03-10", "2025-03-11", "2025-03-12"] {
            store.save_order(&new_order(1, date)).await.expect("saved");
        }
        let orders = store
            .orders_in_range(
                parse_date_key("2025-03-10").expect("valid"),
                parse_date_key("2025-03-11").expect("valid"),
            )
            .await
            .expect("ok");
        assert_eq!(orders.len(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.get_client(UserId::new(1)).await,
            Err(RepositoryError::Database(_))
        ));
        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_admin_add_remove() {
        let store = MemoryStore::new();
        assert!(store.add_admin(UserId::new(5)).await.expect("ok"));
        assert!(!store.add_admin(UserId::new(5)).await.expect("ok"));
        assert!(store.is_admin(UserId::new(5)).await.expect("ok"));
        assert!(store.remove_admin(UserId::new(5)).await.expect("ok"));
        assert!(!store.remove_admin(UserId::new(5)).await.expect("ok"));
    }
}
