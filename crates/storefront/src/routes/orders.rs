//! Customer order route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use milletmart_core::OrderId;

use crate::db::Paged;
use crate::db::orders::OrderRepository;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::{Order, StatusChange};
use crate::routes::PageQuery;
use crate::services::checkout::{CheckoutService, PaymentIntent, PlaceOrderRequest};
use crate::state::AppState;

/// An order with its status history.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub history: Vec<StatusChange>,
}

/// Place an order for the cart and open a payment.
#[instrument(skip(state, session, user, body), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Json(body): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PaymentIntent>)> {
    let intent = CheckoutService::new(state.pool(), &session, state.shipping(), state.gateway())
        .place_order(user.id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

/// The user's orders, newest first.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paged<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id, query.pagination())
        .await?;
    Ok(Json(orders))
}

/// One of the user's orders. Other users' orders are reported as missing.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let repo = OrderRepository::new(state.pool());
    let order = repo.get_for_user(user.id, id).await?;
    let history = repo.history(order.id).await?;
    Ok(Json(OrderDetail { order, history }))
}

/// Cancel an order that has not shipped.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = CheckoutService::new(state.pool(), &session, state.shipping(), state.gateway())
        .cancel(user.id, id)
        .await?;
    Ok(Json(order))
}

/// Open a new payment for an unpaid order.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn retry_payment(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<PaymentIntent>> {
    let intent = CheckoutService::new(state.pool(), &session, state.shipping(), state.gateway())
        .retry_payment(user.id, id)
        .await?;
    Ok(Json(intent))
}
