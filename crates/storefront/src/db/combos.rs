//! Combo (product bundle) repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use milletmart_core::{ComboId, Money, ProductId};

use super::{RepositoryError, to_i32, to_u32};
use crate::models::catalog::ComboHeader;
use crate::models::{Combo, ComboItem};

const COMBO_COLUMNS: &str =
    "id, slug, name, description, price, image_url, is_active, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ComboRow {
    id: ComboId,
    slug: String,
    name: String,
    description: String,
    price: Decimal,
    image_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ComboItemRow {
    combo_id: ComboId,
    product_id: ProductId,
    quantity: i32,
    name: String,
    slug: String,
    price: Decimal,
    stock: i32,
    is_active: bool,
}

/// One component of a new or updated combo.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ComboItemInput {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Fields for a new combo.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCombo {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub items: Vec<ComboItemInput>,
}

const fn default_active() -> bool {
    true
}

/// Partial combo update. `items`, when present, replaces all components.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComboChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
    pub items: Option<Vec<ComboItemInput>>,
}

/// Repository for combo database operations.
pub struct ComboRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ComboRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List combos, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Combo>, RepositoryError> {
        let rows = sqlx::query_as::<_, ComboRow>(&format!(
            "SELECT {COMBO_COLUMNS} FROM combo WHERE $1 OR is_active ORDER BY created_at DESC, id DESC"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        self.assemble(rows).await
    }

    /// Get a combo by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_inactive: bool,
    ) -> Result<Option<Combo>, RepositoryError> {
        let row = sqlx::query_as::<_, ComboRow>(&format!(
            "SELECT {COMBO_COLUMNS} FROM combo WHERE slug = $1 AND ($2 OR is_active)"
        ))
        .bind(slug)
        .bind(include_inactive)
        .fetch_optional(self.pool)
        .await?;

        Ok(self.assemble(row.into_iter().collect()).await?.pop())
    }

    /// Get a combo by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist.
    pub async fn get_by_id(&self, id: ComboId) -> Result<Combo, RepositoryError> {
        self.get_by_ids(&[id])
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)
    }

    /// Get several combos by ID. Missing IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_ids(&self, ids: &[ComboId]) -> Result<Vec<Combo>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = ids.iter().map(ComboId::as_i32).collect();
        let rows = sqlx::query_as::<_, ComboRow>(&format!(
            "SELECT {COMBO_COLUMNS} FROM combo WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        self.assemble(rows).await
    }

    /// Create a combo with its components.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken, a product does
    /// not exist, or the component list is empty.
    pub async fn create(&self, new: &NewCombo) -> Result<Combo, RepositoryError> {
        validate_items(&new.items)?;
        let mut tx = self.pool.begin().await?;

        let id: ComboId = sqlx::query_scalar(
            r"
            INSERT INTO combo (slug, name, description, price, image_url, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(&new.slug)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.image_url.as_deref())
        .bind(new.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "a combo with this slug already exists"))?;

        insert_items(&mut tx, id, &new.items).await?;
        tx.commit().await?;

        self.get_by_id(id).await
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the combo does not exist.
    pub async fn update(
        &self,
        id: ComboId,
        changes: &ComboChanges,
    ) -> Result<Combo, RepositoryError> {
        if let Some(items) = &changes.items {
            validate_items(items)?;
        }
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE combo SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                image_url = COALESCE($5, image_url),
                is_active = COALESCE($6, is_active),
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.price)
        .bind(changes.image_url.as_deref())
        .bind(changes.is_active)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(RepositoryError::NotFound);
        }

        if let Some(items) = &changes.items {
            sqlx::query("DELETE FROM combo_item WHERE combo_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_items(&mut tx, id, items).await?;
        }
        tx.commit().await?;

        self.get_by_id(id).await
    }

    /// Load components for `rows` and assemble domain combos.
    async fn assemble(&self, rows: Vec<ComboRow>) -> Result<Vec<Combo>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let item_rows = sqlx::query_as::<_, ComboItemRow>(
            r"
            SELECT ci.combo_id, ci.product_id, ci.quantity,
                   p.name, p.slug, p.price, p.stock, p.is_active
            FROM combo_item ci
            JOIN product p ON p.id = ci.product_id
            WHERE ci.combo_id = ANY($1)
            ORDER BY ci.combo_id, p.name
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_combo: HashMap<ComboId, Vec<ComboItem>> = HashMap::new();
        for row in item_rows {
            let combo_id = row.combo_id;
            by_combo
                .entry(combo_id)
                .or_default()
                .push(into_item(row)?);
        }

        rows.into_iter()
            .map(|row| {
                let items = by_combo.remove(&row.id).unwrap_or_default();
                let price = Money::non_negative(row.price).map_err(|e| {
                    RepositoryError::DataCorruption(format!("combo {}: {e}", row.id))
                })?;
                let header = ComboHeader {
                    id: row.id,
                    slug: row.slug,
                    name: row.name,
                    description: row.description,
                    price,
                    image_url: row.image_url,
                    is_active: row.is_active,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                };
                Ok(Combo::assemble(header, items))
            })
            .collect()
    }
}

fn into_item(row: ComboItemRow) -> Result<ComboItem, RepositoryError> {
    let list_price = Money::non_negative(row.price).map_err(|e| {
        RepositoryError::DataCorruption(format!("product {}: {e}", row.product_id))
    })?;
    Ok(ComboItem {
        product_id: row.product_id,
        name: row.name,
        slug: row.slug,
        quantity: to_u32(row.quantity, "combo item quantity")?,
        list_price,
        stock: to_u32(row.stock, "stock")?,
        product_active: row.is_active,
    })
}

fn validate_items(items: &[ComboItemInput]) -> Result<(), RepositoryError> {
    if items.is_empty() {
        return Err(RepositoryError::Conflict(
            "a combo needs at least one product".to_owned(),
        ));
    }
    if items.iter().any(|i| i.quantity == 0) {
        return Err(RepositoryError::Conflict(
            "combo item quantities must be positive".to_owned(),
        ));
    }
    Ok(())
}

async fn insert_items(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    combo_id: ComboId,
    items: &[ComboItemInput],
) -> Result<(), RepositoryError> {
    for item in items {
        sqlx::query(
            r"
            INSERT INTO combo_item (combo_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (combo_id, product_id)
                DO UPDATE SET quantity = combo_item.quantity + EXCLUDED.quantity
            ",
        )
        .bind(combo_id)
        .bind(item.product_id)
        .bind(to_i32(item.quantity)?)
        .execute(&mut **tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                RepositoryError::Conflict(format!("product {} does not exist", item.product_id))
            }
            other => RepositoryError::Database(other),
        })?;
    }
    Ok(())
}
