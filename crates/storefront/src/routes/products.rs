//! Public catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::db::combos::ComboRepository;
use crate::db::products::{ProductFilter, ProductRepository, ProductSort};
use crate::db::{Paged, Pagination};
use crate::error::{AppError, Result};
use crate::models::{CategoryCount, Combo, Product};
use crate::state::AppState;

/// Query string of `GET /api/products`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductQuery {
    pub(crate) fn filter(self, include_inactive: bool) -> (ProductFilter, Pagination) {
        let non_empty = |s: Option<String>| {
            s.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        (
            ProductFilter {
                category: non_empty(self.category),
                query: non_empty(self.q),
                sort: self.sort,
                include_inactive,
            },
            Pagination::new(self.page, self.per_page),
        )
    }
}

/// List active products.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Paged<Product>>> {
    let (filter, page) = query.filter(false);
    let products = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(products))
}

/// Product detail with variants and effective prices.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get_by_slug(&slug, false)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

/// Categories of active products with counts.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryCount>>> {
    Ok(Json(ProductRepository::new(state.pool()).categories().await?))
}

/// List active combos.
#[instrument(skip(state))]
pub async fn combos(State(state): State<AppState>) -> Result<Json<Vec<Combo>>> {
    Ok(Json(ComboRepository::new(state.pool()).list(false).await?))
}

/// Combo detail with its components.
#[instrument(skip(state))]
pub async fn combo(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<Combo>> {
    ComboRepository::new(state.pool())
        .get_by_slug(&slug, false)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Combo".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_filters_are_dropped() {
        let query = ProductQuery {
            category: Some("  ".to_string()),
            q: Some(" ragi ".to_string()),
            page: Some(2),
            ..ProductQuery::default()
        };
        let (filter, page) = query.filter(false);
        assert_eq!(filter.category, None);
        assert_eq!(filter.query.as_deref(), Some("ragi"));
        assert_eq!(filter.sort, ProductSort::Newest);
        assert_eq!(page.page, 2);
    }
}
