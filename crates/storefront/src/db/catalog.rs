//! Catalog snapshots for cart reconciliation and pricing.

use std::collections::BTreeSet;

use sqlx::PgPool;

use milletmart_core::cart::{Catalog, LineKey};
use milletmart_core::{ComboId, ProductId};

use super::RepositoryError;
use super::combos::ComboRepository;
use super::products::ProductRepository;

/// Load a [`Catalog`] covering every item in `keys`.
///
/// Items that no longer exist are simply absent from the result, which
/// reconciliation treats as unavailable. No query is issued for an empty
/// key set.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn load_catalog(
    pool: &PgPool,
    keys: impl IntoIterator<Item = LineKey>,
) -> Result<Catalog, RepositoryError> {
    let mut product_ids = BTreeSet::new();
    let mut combo_ids = BTreeSet::new();
    for key in keys {
        match key {
            LineKey::Product { product_id, .. } => {
                product_ids.insert(product_id);
            }
            LineKey::Combo { combo_id } => {
                combo_ids.insert(combo_id);
            }
        }
    }

    let mut catalog = Catalog::new();
    if !product_ids.is_empty() {
        let ids: Vec<ProductId> = product_ids.into_iter().collect();
        for product in ProductRepository::new(pool).get_by_ids(&ids).await? {
            for entry in product.catalog_entries() {
                catalog.insert(entry);
            }
        }
    }
    if !combo_ids.is_empty() {
        let ids: Vec<ComboId> = combo_ids.into_iter().collect();
        for combo in ComboRepository::new(pool).get_by_ids(&ids).await? {
            catalog.insert(combo.catalog_entry());
        }
    }
    Ok(catalog)
}
