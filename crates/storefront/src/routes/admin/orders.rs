//! Admin order management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use milletmart_core::{OrderId, OrderStatus};

use crate::db::orders::OrderRepository;
use crate::db::{Paged, Pagination};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::Order;
use crate::routes::orders::OrderDetail;
use crate::services::orders::{OrderService, TransitionContext};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Body of `POST /api/admin/orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
}

/// All orders, newest first, optionally with one status.
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Paged<Order>>> {
    let page = Pagination::new(query.page, query.per_page);
    Ok(Json(
        OrderRepository::new(state.pool())
            .list(query.status, page)
            .await?,
    ))
}

/// Any order with its status history.
#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let repo = OrderRepository::new(state.pool());
    let order = repo.get(id).await?;
    let history = repo.history(id).await?;
    Ok(Json(OrderDetail { order, history }))
}

/// Move an order through the status machine.
///
/// Cancelling or refunding an order whose stock was committed puts the
/// stock back.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, to = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<OrderDetail>> {
    let mut ctx = TransitionContext::by(admin.id);
    if let Some(note) = body.note.as_deref() {
        ctx = ctx.with_note(note);
    }
    let order = OrderService::new(state.pool())
        .transition_by_id(id, body.status, ctx)
        .await?;
    let history = OrderRepository::new(state.pool()).history(id).await?;
    Ok(Json(OrderDetail { order, history }))
}
