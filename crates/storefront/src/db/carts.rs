//! Server-side carts of signed-in users.

use sqlx::PgPool;

use milletmart_core::cart::{Cart, CartLine, LineKey};
use milletmart_core::{ComboId, ProductId, UserId, VariantId};

use super::{RepositoryError, to_i32, to_u32};

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: Option<ProductId>,
    variant_id: Option<VariantId>,
    combo_id: Option<ComboId>,
    quantity: i32,
}

/// Rebuild a [`LineKey`] from the nullable id columns shared by
/// `cart_item` and `order_item`.
pub(crate) fn line_key(
    product_id: Option<ProductId>,
    variant_id: Option<VariantId>,
    combo_id: Option<ComboId>,
) -> Result<LineKey, RepositoryError> {
    match (product_id, variant_id, combo_id) {
        (Some(product_id), variant_id, None) => Ok(LineKey::Product {
            product_id,
            variant_id,
        }),
        (None, None, Some(combo_id)) => Ok(LineKey::combo(combo_id)),
        _ => Err(RepositoryError::DataCorruption(
            "line must reference exactly one product or combo".to_owned(),
        )),
    }
}

/// Split a [`LineKey`] into `(product_id, variant_id, combo_id)` columns.
pub(crate) const fn line_columns(
    item: LineKey,
) -> (Option<ProductId>, Option<VariantId>, Option<ComboId>) {
    match item {
        LineKey::Product {
            product_id,
            variant_id,
        } => (Some(product_id), variant_id, None),
        LineKey::Combo { combo_id } => (None, None, Some(combo_id)),
    }
}

/// Repository for user cart operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load a user's cart in the order lines were added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT product_id, variant_id, combo_id, quantity
            FROM cart_item
            WHERE user_id = $1
            ORDER BY position, id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(|row| {
                Ok(CartLine {
                    item: line_key(row.product_id, row.variant_id, row.combo_id)?,
                    quantity: to_u32(row.quantity, "cart quantity")?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Cart::from_lines(lines))
    }

    /// Replace a user's stored cart with `cart`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails; nothing is
    /// written in that case.
    pub async fn replace(&self, user_id: UserId, cart: &Cart) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_item WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for (position, line) in (0_i32..).zip(cart.lines()) {
            let (product_id, variant_id, combo_id) = line_columns(line.item);
            sqlx::query(
                r"
                INSERT INTO cart_item (user_id, product_id, variant_id, combo_id, quantity, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(user_id)
            .bind(product_id)
            .bind(variant_id)
            .bind(combo_id)
            .bind(to_i32(line.quantity)?)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Empty a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_item WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_key_columns_agree() {
        let keys = [
            LineKey::product(ProductId::new(1)),
            LineKey::variant(ProductId::new(1), VariantId::new(4)),
            LineKey::combo(ComboId::new(9)),
        ];
        for key in keys {
            let (p, v, c) = line_columns(key);
            assert_eq!(line_key(p, v, c).ok(), Some(key));
        }
    }

    #[test]
    fn test_line_key_rejects_mixed_rows() {
        assert!(line_key(Some(ProductId::new(1)), None, Some(ComboId::new(2))).is_err());
        assert!(line_key(None, Some(VariantId::new(3)), None).is_err());
        assert!(line_key(None, None, None).is_err());
    }
}
