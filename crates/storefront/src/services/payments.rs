//! Payment outcomes from checkout callbacks and gateway webhooks.
//!
//! The browser callback and the webhook for the same payment can arrive in
//! either order, or concurrently. Both paths funnel into
//! [`PaymentService::record_success`] / [`PaymentService::record_failure`],
//! which treat an already-recorded outcome as done.

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use milletmart_core::{OrderStatus, UserId};

use crate::db::RepositoryError;
use crate::db::carts::CartRepository;
use crate::db::orders::OrderRepository;
use crate::error::{AppError, Result};
use crate::models::Order;
use crate::razorpay::{RazorpayClient, WebhookEvent};
use crate::services::orders::{OrderService, TransitionContext};

/// Fields the checkout widget posts after a successful payment.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Fields the checkout widget posts after a failed payment.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentFailureRequest {
    pub razorpay_order_id: String,
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub struct PaymentService<'a> {
    pool: &'a PgPool,
    gateway: &'a RazorpayClient,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, gateway: &'a RazorpayClient) -> Self {
        Self { pool, gateway }
    }

    /// Verify a checkout callback and confirm the order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a bad signature (the order is not
    /// touched) and `AppError::NotFound` if the order is not the user's.
    #[instrument(skip(self, request), fields(gateway_order_id = %request.razorpay_order_id))]
    pub async fn verify(&self, user_id: UserId, request: &VerifyPaymentRequest) -> Result<Order> {
        if !self.gateway.verify_payment(
            &request.razorpay_order_id,
            &request.razorpay_payment_id,
            &request.razorpay_signature,
        ) {
            warn!("Payment signature mismatch");
            return Err(AppError::BadRequest(
                "Payment signature verification failed".to_string(),
            ));
        }

        let order = self
            .owned_order(user_id, &request.razorpay_order_id)
            .await?;
        let (order, _) = self
            .record_success(order, &request.razorpay_payment_id, Some(user_id))
            .await?;
        Ok(order)
    }

    /// Record a failure reported by the checkout widget.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order is not the user's.
    #[instrument(skip(self, request), fields(gateway_order_id = %request.razorpay_order_id))]
    pub async fn failure(
        &self,
        user_id: UserId,
        request: &PaymentFailureRequest,
    ) -> Result<Order> {
        let order = self
            .owned_order(user_id, &request.razorpay_order_id)
            .await?;
        self.record_failure(
            order,
            &request.razorpay_order_id,
            request.razorpay_payment_id.as_deref(),
            request.reason.as_deref(),
            Some(user_id),
        )
        .await
    }

    /// Handle a gateway webhook.
    ///
    /// Events for unknown orders, and events that no longer apply, are
    /// logged and acknowledged so the gateway stops retrying.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a bad signature or body.
    #[instrument(skip_all)]
    pub async fn webhook(&self, body: &[u8], signature: &str) -> Result<()> {
        if !self.gateway.verify_webhook(body, signature) {
            warn!("Webhook signature mismatch");
            return Err(AppError::BadRequest(
                "Webhook signature verification failed".to_string(),
            ));
        }
        let event = WebhookEvent::parse(body)
            .map_err(|e| AppError::BadRequest(format!("Malformed webhook body: {e}")))?;

        let outcome = match &event {
            WebhookEvent::PaymentCaptured {
                gateway_order_id,
                payment_id,
            } => match self.find(gateway_order_id).await? {
                Some(order) => self
                    .record_success(order, payment_id, None)
                    .await
                    .map(|_| ()),
                None => Ok(()),
            },
            WebhookEvent::PaymentFailed {
                gateway_order_id,
                payment_id,
                reason,
            } => match self.find(gateway_order_id).await? {
                Some(order) => self
                    .record_failure(
                        order,
                        gateway_order_id,
                        Some(payment_id),
                        reason.as_deref(),
                        None,
                    )
                    .await
                    .map(|_| ()),
                None => Ok(()),
            },
            WebhookEvent::RefundProcessed {
                gateway_order_id,
                refund_id,
                ..
            } => match self.find(gateway_order_id).await? {
                Some(order) => {
                    let note = format!("refund {refund_id} processed");
                    OrderService::new(self.pool)
                        .transition(
                            order,
                            OrderStatus::Refunded,
                            TransitionContext::default().with_note(&note),
                        )
                        .await
                        .map(|_| ())
                }
                None => Ok(()),
            },
            WebhookEvent::Ignored(name) => {
                debug!(event = %name, "Ignoring webhook event");
                Ok(())
            }
        };

        match outcome {
            // A stale event against an order that has moved on
            Err(AppError::Transition(e)) => {
                warn!(error = %e, ?event, "Webhook event no longer applies");
                Ok(())
            }
            other => other,
        }
    }

    /// Move an order to `PAYMENT_SUCCESS` and on to `CONFIRMED`, committing
    /// stock and clearing the customer's cart.
    ///
    /// Returns the order and whether this call recorded the payment.
    ///
    /// # Errors
    ///
    /// Returns `StatusTransitionError` if the order was cancelled or refunded.
    pub async fn record_success(
        &self,
        order: Order,
        payment_id: &str,
        actor: Option<UserId>,
    ) -> Result<(Order, bool)> {
        if order.status.is_paid() {
            return Ok((order, false));
        }

        let service = OrderService::new(self.pool);
        let ctx = TransitionContext {
            changed_by: actor,
            gateway_payment_id: Some(payment_id),
            ..TransitionContext::default()
        };

        let order = if order.status == OrderStatus::PaymentFailed {
            // Captured after an earlier attempt was reported failed
            service
                .transition(
                    order,
                    OrderStatus::PaymentPending,
                    ctx.with_note("payment captured after failure"),
                )
                .await?
        } else {
            order
        };

        let order_id = order.id;
        let paid = match service
            .transition(order, OrderStatus::PaymentSuccess, ctx)
            .await
        {
            Ok(paid) => paid,
            Err(AppError::Database(RepositoryError::Conflict(_))) => {
                // Lost a race with the other notification path
                let current = OrderRepository::new(self.pool).get(order_id).await?;
                if current.status.is_paid() {
                    return Ok((current, false));
                }
                return Err(AppError::Conflict(
                    "Order changed while recording payment".to_string(),
                ));
            }
            Err(e) => return Err(e),
        };

        let confirmed = service
            .transition(
                paid,
                OrderStatus::Confirmed,
                TransitionContext {
                    changed_by: actor,
                    ..TransitionContext::default()
                }
                .with_note("payment verified"),
            )
            .await?;

        CartRepository::new(self.pool)
            .clear(confirmed.user_id)
            .await?;
        info!(order_id = %confirmed.id, payment_id, "Payment recorded");
        Ok((confirmed, true))
    }

    /// Move a pending order to `PAYMENT_FAILED`.
    ///
    /// Failures reported after the order was paid or closed, or for a
    /// gateway order a retry has replaced, are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the status write fails.
    pub async fn record_failure(
        &self,
        order: Order,
        gateway_order_id: &str,
        payment_id: Option<&str>,
        reason: Option<&str>,
        actor: Option<UserId>,
    ) -> Result<Order> {
        if order.gateway_order_id.as_deref() != Some(gateway_order_id) {
            debug!(
                order_id = %order.id,
                gateway_order_id,
                "Ignoring failure of a replaced payment attempt"
            );
            return Ok(order);
        }
        if order.status != OrderStatus::PaymentPending {
            debug!(order_id = %order.id, status = %order.status, "Ignoring payment failure");
            return Ok(order);
        }
        OrderService::new(self.pool)
            .transition(
                order,
                OrderStatus::PaymentFailed,
                TransitionContext {
                    changed_by: actor,
                    gateway_payment_id: payment_id,
                    failure_reason: Some(reason.unwrap_or("payment failed")),
                    note: None,
                },
            )
            .await
    }

    async fn find(&self, gateway_order_id: &str) -> Result<Option<Order>> {
        let order = OrderRepository::new(self.pool)
            .get_by_gateway_order_id(gateway_order_id)
            .await?;
        if order.is_none() {
            warn!(gateway_order_id, "Webhook for unknown gateway order");
        }
        Ok(order)
    }

    async fn owned_order(&self, user_id: UserId, gateway_order_id: &str) -> Result<Order> {
        match OrderRepository::new(self.pool)
            .get_by_gateway_order_id(gateway_order_id)
            .await?
        {
            Some(order) if order.user_id == user_id => Ok(order),
            _ => Err(AppError::NotFound("Order".to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use secrecy::SecretString;

    use milletmart_core::{AddressInput, Currency, Money, OrderId, ShippingAddress};

    use super::*;
    use crate::config::RazorpayConfig;

    fn gateway() -> RazorpayClient {
        RazorpayClient::new(&RazorpayConfig {
            api_base: "https://gateway.example.test/".to_string(),
            key_id: "rzp_test_Kq2xY8mZ".to_string(),
            key_secret: SecretString::from("kS9!vT2#pL7@qW4z"),
            webhook_secret: SecretString::from("wH6$nB3^mR8&xC1j"),
        })
        .unwrap()
    }

    fn pending_order(gateway_order_id: &str) -> Order {
        let address = ShippingAddress::try_from(AddressInput {
            full_name: "Lakshmi Rao".into(),
            phone: "9845012345".into(),
            line1: "12, 4th Cross, Jayanagar".into(),
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            postal_code: "560011".into(),
            ..AddressInput::default()
        })
        .unwrap();
        let total = Money::inr(189.into());
        Order {
            id: OrderId::new(7),
            user_id: UserId::new(uuid::Uuid::from_u128(1)),
            status: OrderStatus::PaymentPending,
            items: Vec::new(),
            shipping_address: address,
            subtotal: total,
            savings: Money::zero(),
            shipping_fee: Money::zero(),
            total,
            currency: Currency::INR,
            gateway_order_id: Some(gateway_order_id.to_string()),
            gateway_payment_id: None,
            failure_reason: None,
            stock_committed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_failure_of_replaced_attempt_leaves_order_pending() {
        // Lazy pool: the ignored failure never writes
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        let gateway = gateway();
        let service = PaymentService::new(&pool, &gateway);

        let order = service
            .record_failure(
                pending_order("order_retry"),
                "order_first",
                Some("pay_first"),
                Some("card declined"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::PaymentPending);
        assert_eq!(order.failure_reason, None);
    }

    #[tokio::test]
    async fn test_late_failure_after_payment_is_ignored() {
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        let gateway = gateway();
        let service = PaymentService::new(&pool, &gateway);

        let mut order = pending_order("order_first");
        order.status = OrderStatus::Confirmed;
        let order = service
            .record_failure(order, "order_first", None, None, None)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }
}
