//! Order ledger.
//!
//! Orders are appended once and never deleted. The only mutation is the
//! conditional `active -> cancelled` transition in [`OrderRepository::cancel`].

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use krash_order_core::{
    DeliveryInterval, NewOrder, Order, OrderId, OrderSnapshot, OrderStatus, UserId,
};

use super::RepositoryError;

const ORDER_COLUMNS: &str =
    "order_id, user_id, order_data, delivery_date, delivery_time, status, created_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    order_id: i32,
    user_id: i64,
    order_data: serde_json::Value,
    delivery_date: NaiveDate,
    delivery_time: String,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let order_data: OrderSnapshot = serde_json::from_value(row.order_data).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "invalid order_data for order {}: {e}",
                row.order_id
            ))
        })?;
        let delivery_time = DeliveryInterval::parse(&row.delivery_time).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "invalid delivery_time for order {}: {e}",
                row.order_id
            ))
        })?;

        Ok(Self {
            order_id: OrderId::new(row.order_id),
            user_id: UserId::new(row.user_id),
            order_data,
            delivery_date: row.delivery_date,
            delivery_time,
            status: row.status,
            created_at: row.created_at,
        })
    }
}

/// Repository for the `orders` table.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an order and return its id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(&self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        let id = sqlx::query_scalar::<_, i32>(
            r"
            INSERT INTO orders (user_id, order_data, delivery_date, delivery_time, status)
            VALUES ($1, $2, $3, $4, 'active')
            RETURNING order_id
            ",
        )
        .bind(order.user_id)
        .bind(Json(&order.order_data))
        .bind(order.slot.date)
        .bind(order.slot.interval.label())
        .fetch_one(self.pool)
        .await?;

        Ok(OrderId::new(id))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row cannot be decoded.
    pub async fn get(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Cancel an active order. Returns `false` if nothing was updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn cancel(&self, order_id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'cancelled' WHERE order_id = $1 AND status = 'active'",
        )
        .bind(order_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// The user's most recently created active order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row cannot be decoded.
    pub async fn latest_active(&self, user_id: UserId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE user_id = $1 AND status = 'active'
            ORDER BY created_at DESC, order_id DESC
            LIMIT 1
            "
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Orders with a delivery date in `[start, end]`, oldest delivery first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if any row cannot be decoded.
    pub async fn in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE delivery_date BETWEEN $1 AND $2
            ORDER BY delivery_date, order_id
            "
        ))
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
