//! Address book repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use milletmart_core::{AddressId, AddressInput, ShippingAddress, UserId};

use super::RepositoryError;
use crate::models::SavedAddress;

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    full_name: String,
    phone: String,
    line1: String,
    line2: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    is_default: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AddressRow> for SavedAddress {
    type Error = RepositoryError;

    fn try_from(row: AddressRow) -> Result<Self, Self::Error> {
        let address = ShippingAddress::try_from(AddressInput {
            full_name: row.full_name,
            phone: row.phone,
            line1: row.line1,
            line2: row.line2,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: Some(row.country),
        })
        .map_err(|e| RepositoryError::DataCorruption(format!("address {}: {e}", row.id)))?;

        Ok(Self {
            id: row.id,
            address,
            is_default: row.is_default,
            created_at: row.created_at,
        })
    }
}

const ADDRESS_COLUMNS: &str = "id, full_name, phone, line1, line2, city, state, postal_code, \
                               country, is_default, created_at";

/// Repository for saved addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<SavedAddress>, RepositoryError> {
        sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM saved_address WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(SavedAddress::try_from)
        .collect()
    }

    /// Get one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist or belongs
    /// to someone else.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<SavedAddress, RepositoryError> {
        sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM saved_address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Save an address. The first address, or one saved with
    /// `make_default`, becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn create(
        &self,
        user_id: UserId,
        address: &ShippingAddress,
        make_default: bool,
    ) -> Result<SavedAddress, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let has_default: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM saved_address WHERE user_id = $1 AND is_default)",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let is_default = make_default || !has_default;
        if is_default && has_default {
            clear_default(&mut tx, user_id).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO saved_address
                (user_id, full_name, phone, line1, line2, city, state, postal_code, country, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&address.full_name)
        .bind(address.phone.as_str())
        .bind(&address.line1)
        .bind(address.line2.as_deref())
        .bind(&address.city)
        .bind(&address.state)
        .bind(address.postal_code.as_str())
        .bind(&address.country)
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Make an address the user's default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<SavedAddress, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        clear_default(&mut tx, user_id).await?;

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "UPDATE saved_address SET is_default = true WHERE id = $1 AND user_id = $2 \
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        row.try_into()
    }

    /// Delete an address. If it was the default, the newest remaining
    /// address takes over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default: Option<bool> = sqlx::query_scalar(
            "DELETE FROM saved_address WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        match was_default {
            None => return Err(RepositoryError::NotFound),
            Some(true) => {
                sqlx::query(
                    r"
                    UPDATE saved_address SET is_default = true
                    WHERE id = (
                        SELECT id FROM saved_address WHERE user_id = $1
                        ORDER BY created_at DESC, id DESC LIMIT 1
                    )
                    ",
                )
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }
            Some(false) => {}
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn clear_default(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE saved_address SET is_default = false WHERE user_id = $1 AND is_default")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
