//! Runtime-managed staff list.

use sqlx::PgPool;

use krash_order_core::UserId;

use super::RepositoryError;

/// Repository for the `admins` table.
pub struct AdminRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM admins WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(found)
    }

    /// Add an admin. Returns `false` if the row already existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn add(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("INSERT INTO admins (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Remove an admin. Returns `false` if there was no such row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn remove(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM admins WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// All stored admins, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<UserId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT user_id FROM admins ORDER BY created_at")
            .fetch_all(self.pool)
            .await?;

        Ok(ids.into_iter().map(UserId::new).collect())
    }
}
