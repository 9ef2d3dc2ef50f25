//! Payment callback and webhook handlers.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::Order;
use crate::services::payments::{PaymentFailureRequest, PaymentService, VerifyPaymentRequest};
use crate::state::AppState;

/// Header carrying the webhook body signature.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Verify the checkout widget's success callback and confirm the order.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn verify(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<Order>> {
    let order = PaymentService::new(state.pool(), state.gateway())
        .verify(user.id, &body)
        .await?;
    Ok(Json(order))
}

/// Record a failure reported by the checkout widget.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn failure(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<PaymentFailureRequest>,
) -> Result<Json<Order>> {
    let order = PaymentService::new(state.pool(), state.gateway())
        .failure(user.id, &body)
        .await?;
    Ok(Json(order))
}

/// Gateway webhook. The raw body is needed to check the signature.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>)> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing webhook signature".to_string()))?;

    PaymentService::new(state.pool(), state.gateway())
        .webhook(&body, signature)
        .await?;
    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))))
}
