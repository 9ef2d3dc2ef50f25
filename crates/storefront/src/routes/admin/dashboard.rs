//! Admin dashboard.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::orders::{OrderRepository, OrderStats};
use crate::db::products::{LowStock, ProductRepository};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 10;
const LOW_STOCK_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub low_stock_threshold: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub orders: OrderStats,
    pub low_stock_threshold: i32,
    pub low_stock: Vec<LowStock>,
}

/// Order counts by status, paid revenue and low-stock items.
#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Dashboard>> {
    let threshold = query
        .low_stock_threshold
        .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD)
        .max(0);
    let orders = OrderRepository::new(state.pool()).stats().await?;
    let low_stock = ProductRepository::new(state.pool())
        .low_stock(threshold, LOW_STOCK_LIMIT)
        .await?;
    Ok(Json(Dashboard {
        orders,
        low_stock_threshold: threshold,
        low_stock,
    }))
}
