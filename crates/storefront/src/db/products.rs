//! Product and variant repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use milletmart_core::{Money, MoneyError, ProductId, VariantId};

use super::{Paged, Pagination, RepositoryError, to_i32, to_u32};
use crate::models::{CategoryCount, Product, Variant};

const PRODUCT_COLUMNS: &str = "id, slug, name, description, category, price, discount_percent, \
                               stock, image_url, is_active, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    slug: String,
    name: String,
    description: String,
    category: String,
    price: Decimal,
    discount_percent: i32,
    stock: i32,
    image_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: VariantId,
    product_id: ProductId,
    label: String,
    price: Decimal,
    stock: i32,
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "created_at DESC, id DESC",
            Self::PriceAsc => "price * (100 - discount_percent) ASC, id",
            Self::PriceDesc => "price * (100 - discount_percent) DESC, id",
            Self::Name => "name ASC, id",
        }
    }
}

/// Filters for [`ProductRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    /// Case-insensitive match on name or description.
    pub query: Option<String>,
    pub sort: ProductSort,
    pub include_inactive: bool,
}

/// Fields for a new product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount_percent: i32,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Partial product update; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub discount_percent: Option<i32>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

/// Fields for a new variant.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVariant {
    pub label: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: u32,
}

/// A product or variant whose stock is at or below a threshold.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct LowStock {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub stock: i32,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: Pagination,
    ) -> Result<Paged<Product>, RepositoryError> {
        const WHERE: &str = "WHERE ($1 OR is_active) \
                             AND ($2::text IS NULL OR category = $2) \
                             AND ($3::text IS NULL OR name ILIKE $3 OR description ILIKE $3)";

        let pattern = filter.query.as_deref().map(like_pattern);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM product {WHERE}"))
            .bind(filter.include_inactive)
            .bind(filter.category.as_deref())
            .bind(pattern.as_deref())
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product {WHERE} ORDER BY {} LIMIT $4 OFFSET $5",
            filter.sort.order_by()
        ))
        .bind(filter.include_inactive)
        .bind(filter.category.as_deref())
        .bind(pattern.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Paged {
            items: self.attach_variants(rows).await?,
            page: page.page,
            per_page: page.per_page,
            total,
        })
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_inactive: bool,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE slug = $1 AND ($2 OR is_active)"
        ))
        .bind(slug)
        .bind(include_inactive)
        .fetch_optional(self.pool)
        .await?;

        Ok(self
            .attach_variants(row.into_iter().collect())
            .await?
            .pop())
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Product, RepositoryError> {
        self.get_by_ids(&[id])
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)
    }

    /// Get several products by ID, active or not. Missing IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        self.attach_variants(rows).await
    }

    /// Active product counts per category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<CategoryCount>, RepositoryError> {
        Ok(sqlx::query_as::<_, CategoryCount>(
            r"
            SELECT category, COUNT(*) AS product_count
            FROM product
            WHERE is_active
            GROUP BY category
            ORDER BY category
            ",
        )
        .fetch_all(self.pool)
        .await?)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO product
                (slug, name, description, category, price, discount_percent, stock, image_url, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(&new.slug)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.category)
        .bind(new.price)
        .bind(new.discount_percent)
        .bind(to_i32(new.stock)?)
        .bind(new.image_url.as_deref())
        .bind(new.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "a product with this slug already exists"))?;

        self.get_by_id(id).await
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE product SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                price = COALESCE($5, price),
                discount_percent = COALESCE($6, discount_percent),
                image_url = COALESCE($7, image_url),
                is_active = COALESCE($8, is_active),
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.category.as_deref())
        .bind(changes.price)
        .bind(changes.discount_percent)
        .bind(changes.image_url.as_deref())
        .bind(changes.is_active)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_by_id(id).await
    }

    /// Add `delta` to a product's stock. The result may not go below zero.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the stock would become negative,
    /// `RepositoryError::NotFound` if the product does not exist.
    pub async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<Product, RepositoryError> {
        let updated: Option<ProductId> = sqlx::query_scalar(
            r"
            UPDATE product SET stock = stock + $2, updated_at = now()
            WHERE id = $1 AND stock + $2 >= 0
            RETURNING id
            ",
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await?;

        match updated {
            Some(id) => self.get_by_id(id).await,
            None => {
                // Distinguish a missing product from an over-large decrement
                self.get_by_id(id).await?;
                Err(RepositoryError::Conflict(
                    "stock cannot go below zero".to_owned(),
                ))
            }
        }
    }

    /// Add `delta` to a variant's stock. The result may not go below zero.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the stock would become negative,
    /// `RepositoryError::NotFound` if the variant does not belong to the product.
    pub async fn adjust_variant_stock(
        &self,
        product_id: ProductId,
        variant_id: VariantId,
        delta: i32,
    ) -> Result<Product, RepositoryError> {
        let updated = sqlx::query(
            r"
            UPDATE product_variant SET stock = stock + $3
            WHERE id = $2 AND product_id = $1 AND stock + $3 >= 0
            ",
        )
        .bind(product_id)
        .bind(variant_id)
        .bind(delta)
        .execute(self.pool)
        .await?
        .rows_affected();

        let product = self.get_by_id(product_id).await?;
        if updated == 0 {
            if product.variants.iter().any(|v| v.id == variant_id) {
                return Err(RepositoryError::Conflict(
                    "stock cannot go below zero".to_owned(),
                ));
            }
            return Err(RepositoryError::NotFound);
        }
        Ok(product)
    }

    /// Add a pack size to a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the label already exists for
    /// this product, `RepositoryError::NotFound` if the product does not exist.
    pub async fn add_variant(
        &self,
        product_id: ProductId,
        new: &NewVariant,
    ) -> Result<Product, RepositoryError> {
        // Ensures a 404 rather than a foreign-key error
        self.get_by_id(product_id).await?;

        sqlx::query(
            "INSERT INTO product_variant (product_id, label, price, stock) VALUES ($1, $2, $3, $4)",
        )
        .bind(product_id)
        .bind(&new.label)
        .bind(new.price)
        .bind(to_i32(new.stock)?)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "this product already has a variant with that label"))?;

        self.get_by_id(product_id).await
    }

    /// Remove a pack size. Carts holding it lose the line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not belong to the product.
    pub async fn remove_variant(
        &self,
        product_id: ProductId,
        variant_id: VariantId,
    ) -> Result<Product, RepositoryError> {
        let removed = sqlx::query("DELETE FROM product_variant WHERE id = $1 AND product_id = $2")
            .bind(variant_id)
            .bind(product_id)
            .execute(self.pool)
            .await?
            .rows_affected();

        if removed == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_by_id(product_id).await
    }

    /// Active products and variants with `stock <= threshold`, lowest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(
        &self,
        threshold: i32,
        limit: i64,
    ) -> Result<Vec<LowStock>, RepositoryError> {
        Ok(sqlx::query_as::<_, LowStock>(
            r"
            SELECT id AS product_id, NULL::integer AS variant_id, name, stock
            FROM product
            WHERE is_active AND stock <= $1
            UNION ALL
            SELECT p.id, v.id, p.name || ' (' || v.label || ')', v.stock
            FROM product_variant v
            JOIN product p ON p.id = v.product_id
            WHERE p.is_active AND v.stock <= $1
            ORDER BY stock, name
            LIMIT $2
            ",
        )
        .bind(threshold)
        .bind(limit)
        .fetch_all(self.pool)
        .await?)
    }

    /// Load variants for `rows` and convert everything to domain products.
    async fn attach_variants(&self, rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let variant_rows = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT id, product_id, label, price, stock
            FROM product_variant
            WHERE product_id = ANY($1)
            ORDER BY product_id, price, id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_product: HashMap<ProductId, Vec<VariantRow>> = HashMap::new();
        for v in variant_rows {
            by_product.entry(v.product_id).or_default().push(v);
        }

        rows.into_iter()
            .map(|row| {
                let variants = by_product.remove(&row.id).unwrap_or_default();
                into_product(row, variants)
            })
            .collect()
    }
}

fn into_product(row: ProductRow, variants: Vec<VariantRow>) -> Result<Product, RepositoryError> {
    let id = row.id;
    let corrupt =
        |e: MoneyError| RepositoryError::DataCorruption(format!("product {id}: {e}"));
    let price = Money::non_negative(row.price).map_err(corrupt)?;
    let effective_price = price.discounted(row.discount_percent).map_err(corrupt)?;

    let variants = variants
        .into_iter()
        .map(|v| {
            let price = Money::non_negative(v.price).map_err(corrupt)?;
            Variant::new(
                v.id,
                v.product_id,
                v.label,
                price,
                to_u32(v.stock, "variant stock")?,
                row.discount_percent,
            )
            .map_err(corrupt)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Product {
        id,
        slug: row.slug,
        name: row.name,
        description: row.description,
        category: row.category,
        price,
        discount_percent: row.discount_percent,
        effective_price,
        stock: to_u32(row.stock, "stock")?,
        image_url: row.image_url,
        is_active: row.is_active,
        variants,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Build an `ILIKE` pattern matching `query` anywhere, with wildcards escaped.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" ragi "), "%ragi%");
        assert_eq!(like_pattern("100%_pure"), "%100\\%\\_pure%");
    }

    #[test]
    fn test_sort_deserializes_snake_case() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap_or_default();
        assert_eq!(sort, ProductSort::PriceDesc);
    }
}
