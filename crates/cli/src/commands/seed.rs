//! Catalog seeding from YAML.
//!
//! Products and combos are matched by slug and updated in place, so the same
//! file can be applied repeatedly. Variants are matched by label within their
//! product. A combo's components are replaced by the ones in the file and
//! must be products defined in the same file.
//!
//! ```yaml
//! products:
//!   - slug: ragi-flour
//!     name: Ragi Flour
//!     category: flours
//!     price: 120
//!     discount_percent: 10
//!     stock: 40
//!     variants:
//!       - { label: 1 kg, price: 220, stock: 15 }
//! combos:
//!   - slug: breakfast-kit
//!     name: Breakfast Kit
//!     price: 399
//!     items:
//!       - { product: ragi-flour, quantity: 1 }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use tracing::{error, info};

use milletmart_core::validate_discount;

use super::{CommandError, connect};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Cannot read {0}: {1}")]
    Read(String, std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error("Combo {combo} uses unknown product {product}")]
    UnknownProduct { combo: String, product: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Top level of the seed file.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub products: Vec<ProductSeed>,
    #[serde(default)]
    pub combos: Vec<ComboSeed>,
}

#[derive(Debug, Deserialize)]
pub struct ProductSeed {
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
    #[serde(default)]
    pub variants: Vec<VariantSeed>,
}

#[derive(Debug, Deserialize)]
pub struct VariantSeed {
    pub label: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: u32,
}

#[derive(Debug, Deserialize)]
pub struct ComboSeed {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub items: Vec<ComboItemSeed>,
}

#[derive(Debug, Deserialize)]
pub struct ComboItemSeed {
    /// Product slug.
    pub product: String,
    pub quantity: u32,
}

const fn default_active() -> bool {
    true
}

/// Check a seed file for problems that would otherwise fail half-way
/// through the import.
#[must_use]
pub fn validate(seed: &CatalogSeed) -> Vec<String> {
    let mut errors = Vec::new();
    let mut product_slugs = HashSet::new();
    let prices: HashMap<&str, Decimal> = seed
        .products
        .iter()
        .map(|p| (p.slug.as_str(), p.price))
        .collect();

    for product in &seed.products {
        let slug = &product.slug;
        if !is_valid_slug(slug) {
            errors.push(format!("product {slug:?}: slug must be lowercase letters, digits and dashes"));
        }
        if !product_slugs.insert(slug.as_str()) {
            errors.push(format!("product {slug}: duplicate slug"));
        }
        if product.name.trim().is_empty() {
            errors.push(format!("product {slug}: name is empty"));
        }
        if product.price.is_sign_negative() {
            errors.push(format!("product {slug}: negative price"));
        }
        if validate_discount(product.discount_percent).is_err() {
            errors.push(format!(
                "product {slug}: discount {} is not between 0 and 100",
                product.discount_percent
            ));
        }
        if i32::try_from(product.stock).is_err() {
            errors.push(format!("product {slug}: stock is too large"));
        }

        let mut labels = HashSet::new();
        for variant in &product.variants {
            if !labels.insert(variant.label.as_str()) {
                errors.push(format!("product {slug}: duplicate variant {}", variant.label));
            }
            if variant.price.is_sign_negative() {
                errors.push(format!("product {slug}: variant {} has a negative price", variant.label));
            }
            if i32::try_from(variant.stock).is_err() {
                errors.push(format!("product {slug}: variant {} stock is too large", variant.label));
            }
        }
    }

    let mut combo_slugs = HashSet::new();
    for combo in &seed.combos {
        let slug = &combo.slug;
        if !is_valid_slug(slug) {
            errors.push(format!("combo {slug:?}: slug must be lowercase letters, digits and dashes"));
        }
        if !combo_slugs.insert(slug.as_str()) {
            errors.push(format!("combo {slug}: duplicate slug"));
        }
        if combo.price.is_sign_negative() {
            errors.push(format!("combo {slug}: negative price"));
        }
        if combo.items.is_empty() {
            errors.push(format!("combo {slug}: no items"));
        }
        let mut list_price = Decimal::ZERO;
        for item in &combo.items {
            if item.quantity == 0 || i32::try_from(item.quantity).is_err() {
                errors.push(format!("combo {slug}: bad quantity for {}", item.product));
            }
            match prices.get(item.product.as_str()) {
                Some(price) => list_price += *price * Decimal::from(item.quantity),
                None => errors.push(format!("combo {slug}: unknown product {}", item.product)),
            }
        }
        if !combo.items.is_empty() && combo.price > list_price {
            errors.push(format!(
                "combo {slug}: price {} is above its components' total {list_price}",
                combo.price
            ));
        }
    }

    errors
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Seed the catalog from a YAML file.
///
/// Everything is written in one transaction.
///
/// # Errors
///
/// Returns an error if the file is invalid, a combo names a product that
/// does not exist, or a database statement fails.
pub async fn catalog(path: &Path) -> Result<(), SeedError> {
    info!(path = %path.display(), "Loading catalog");
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SeedError::Read(path.display().to_string(), e))?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;
    info!(
        products = seed.products.len(),
        combos = seed.combos.len(),
        "Parsed catalog"
    );

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()));
    }

    let pool = connect().await?;
    apply(&pool, &seed).await?;

    info!("Seeding complete!");
    Ok(())
}

async fn apply(pool: &PgPool, seed: &CatalogSeed) -> Result<(), SeedError> {
    let mut tx = pool.begin().await?;

    for product in &seed.products {
        upsert_product(&mut tx, product).await?;
    }
    info!("  Products upserted: {}", seed.products.len());

    for combo in &seed.combos {
        upsert_combo(&mut tx, combo).await?;
    }
    info!("  Combos upserted: {}", seed.combos.len());

    tx.commit().await?;
    Ok(())
}

// Counts were range-checked by `validate`
#[allow(clippy::cast_possible_wrap)]
async fn upsert_product(
    tx: &mut Transaction<'_, Postgres>,
    product: &ProductSeed,
) -> Result<(), SeedError> {
    let id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO product
            (slug, name, description, category, price, discount_percent, stock, image_url, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (slug) DO UPDATE SET
            name = EXCLUDED.name,
            description = EXCLUDED.description,
            category = EXCLUDED.category,
            price = EXCLUDED.price,
            discount_percent = EXCLUDED.discount_percent,
            stock = EXCLUDED.stock,
            image_url = EXCLUDED.image_url,
            is_active = EXCLUDED.is_active,
            updated_at = now()
        RETURNING id
        ",
    )
    .bind(&product.slug)
    .bind(&product.name)
    .bind(&product.description)
    .bind(&product.category)
    .bind(product.price)
    .bind(product.discount_percent)
    .bind(product.stock as i32)
    .bind(product.image_url.as_deref())
    .bind(product.is_active)
    .fetch_one(&mut **tx)
    .await?;

    for variant in &product.variants {
        sqlx::query(
            r"
            INSERT INTO product_variant (product_id, label, price, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id, label) DO UPDATE SET
                price = EXCLUDED.price,
                stock = EXCLUDED.stock
            ",
        )
        .bind(id)
        .bind(&variant.label)
        .bind(variant.price)
        .bind(variant.stock as i32)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[allow(clippy::cast_possible_wrap)]
async fn upsert_combo(
    tx: &mut Transaction<'_, Postgres>,
    combo: &ComboSeed,
) -> Result<(), SeedError> {
    let id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO combo (slug, name, description, price, image_url, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (slug) DO UPDATE SET
            name = EXCLUDED.name,
            description = EXCLUDED.description,
            price = EXCLUDED.price,
            image_url = EXCLUDED.image_url,
            is_active = EXCLUDED.is_active,
            updated_at = now()
        RETURNING id
        ",
    )
    .bind(&combo.slug)
    .bind(&combo.name)
    .bind(&combo.description)
    .bind(combo.price)
    .bind(combo.image_url.as_deref())
    .bind(combo.is_active)
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM combo_item WHERE combo_id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    for item in &combo.items {
        let inserted = sqlx::query(
            r"
            INSERT INTO combo_item (combo_id, product_id, quantity)
            SELECT $1, id, $3 FROM product WHERE slug = $2
            ON CONFLICT (combo_id, product_id)
                DO UPDATE SET quantity = combo_item.quantity + EXCLUDED.quantity
            ",
        )
        .bind(id)
        .bind(&item.product)
        .bind(item.quantity as i32)
        .execute(&mut **tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(SeedError::UnknownProduct {
                combo: combo.slug.clone(),
                product: item.product.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../../seed/catalog.yaml");

    #[test]
    fn test_sample_catalog_is_valid() {
        let seed: CatalogSeed = serde_yaml::from_str(SAMPLE).unwrap();
        assert!(!seed.products.is_empty());
        assert!(!seed.combos.is_empty());
        assert_eq!(validate(&seed), Vec::<String>::new());
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let yaml = r"
products:
  - { slug: ragi-flour, name: Ragi, category: flours, price: 120, discount_percent: 120 }
  - { slug: ragi-flour, name: '', category: flours, price: -1 }
combos:
  - { slug: Bad Slug, name: Kit, price: 10, items: [] }
  - slug: pricey-kit
    name: Pricey Kit
    price: 500
    items:
      - { product: ragi-flour, quantity: 2 }
      - { product: missing, quantity: 1 }
";
        let seed: CatalogSeed = serde_yaml::from_str(yaml).unwrap();
        let errors = validate(&seed);
        assert!(errors.iter().any(|e| e.contains("discount 120")));
        assert!(errors.iter().any(|e| e.contains("duplicate slug")));
        assert!(errors.iter().any(|e| e.contains("name is empty")));
        assert!(errors.iter().any(|e| e.contains("negative price")));
        assert!(errors.iter().any(|e| e.contains("no items")));
        assert!(errors.iter().any(|e| e.contains("\"Bad Slug\"")));
        assert!(errors.iter().any(|e| e.contains("unknown product missing")));
        assert!(errors.iter().any(|e| e.contains("pricey-kit: price 500 is above")));
    }

    #[test]
    fn test_slug_rules() {
        assert!(is_valid_slug("little-millet-500g"));
        assert!(!is_valid_slug("-ragi"));
        assert!(!is_valid_slug("Ragi"));
        assert!(!is_valid_slug(""));
    }
}
