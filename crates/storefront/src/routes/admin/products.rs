//! Admin product management.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument};

use milletmart_core::{ProductId, VariantId};

use crate::db::Paged;
use crate::db::products::{NewProduct, NewVariant, ProductChanges, ProductRepository};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::Product;
use crate::routes::products::ProductQuery;
use crate::state::AppState;

/// Body of `POST /api/admin/products/{id}/stock`.
#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    /// Units to add (positive) or remove (negative).
    pub delta: i32,
    /// Adjust this variant instead of the product itself.
    #[serde(default)]
    pub variant_id: Option<VariantId>,
}

/// All products, including inactive ones.
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Paged<Product>>> {
    let (filter, page) = query.filter(true);
    Ok(Json(
        ProductRepository::new(state.pool())
            .list(&filter, page)
            .await?,
    ))
}

#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(ProductRepository::new(state.pool()).get_by_id(id).await?))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, slug = %body.slug))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = ProductRepository::new(state.pool()).create(&body).await?;
    info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductChanges>,
) -> Result<Json<Product>> {
    Ok(Json(
        ProductRepository::new(state.pool())
            .update(id, &body)
            .await?,
    ))
}

/// Hide a product from the storefront. Existing carts drop it on their
/// next reconciliation.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn deactivate(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let changes = ProductChanges {
        is_active: Some(false),
        ..ProductChanges::default()
    };
    let product = ProductRepository::new(state.pool())
        .update(id, &changes)
        .await?;
    info!(product_id = %id, "Product deactivated");
    Ok(Json(product))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn adjust_stock(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<StockAdjustment>,
) -> Result<Json<Product>> {
    let repo = ProductRepository::new(state.pool());
    let product = match body.variant_id {
        Some(variant_id) => repo.adjust_variant_stock(id, variant_id, body.delta).await?,
        None => repo.adjust_stock(id, body.delta).await?,
    };
    info!(product_id = %id, delta = body.delta, "Stock adjusted");
    Ok(Json(product))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn add_variant(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<NewVariant>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = ProductRepository::new(state.pool())
        .add_variant(id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn remove_variant(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path((id, variant_id)): Path<(ProductId, VariantId)>,
) -> Result<Json<Product>> {
    Ok(Json(
        ProductRepository::new(state.pool())
            .remove_variant(id, variant_id)
            .await?,
    ))
}
