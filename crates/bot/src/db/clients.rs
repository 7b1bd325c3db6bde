//! Client directory: registered organizations.

use sqlx::PgPool;

use krash_order_core::{ClientProfile, PartyName, UserId};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    user_id: i64,
    organization: String,
    contact_person: String,
    username: Option<String>,
}

impl TryFrom<ClientRow> for ClientProfile {
    type Error = RepositoryError;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        let organization = PartyName::parse(&row.organization).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid organization in database: {e}"))
        })?;
        let contact_person = PartyName::parse(&row.contact_person).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid contact person in database: {e}"))
        })?;

        Ok(Self {
            user_id: UserId::new(row.user_id),
            organization,
            contact_person,
            username: row.username,
        })
    }
}

/// Repository for client profiles.
pub struct ClientRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ClientRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the profile registered for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored name no longer validates.
    pub async fn get(&self, user_id: UserId) -> Result<Option<ClientProfile>, RepositoryError> {
        let row = sqlx::query_as::<_, ClientRow>(
            r"
            SELECT user_id, organization, contact_person, username
            FROM clients
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Insert a profile, or overwrite the existing one for the same user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn upsert(&self, profile: &ClientProfile) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO clients (user_id, organization, contact_person, username)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET organization = EXCLUDED.organization,
                contact_person = EXCLUDED.contact_person,
                username = EXCLUDED.username,
                updated_at = NOW()
            ",
        )
        .bind(profile.user_id)
        .bind(profile.organization.as_str())
        .bind(profile.contact_person.as_str())
        .bind(profile.username.as_deref())
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
