//! Checkout: turning a cart into an order and a gateway payment.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use milletmart_core::cart::{CartError, ShippingPolicy, price_cart};
use milletmart_core::{AddressId, AddressInput, OrderId, OrderStatus, ShippingAddress, UserId};

use crate::db::addresses::AddressRepository;
use crate::db::orders::OrderRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::Order;
use crate::razorpay::RazorpayClient;
use crate::services::cart::{CartOwner, CartService, ReconciledCart};
use crate::services::orders::{OrderService, TransitionContext};

/// Body of `POST /api/orders`: a new address or a saved one.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub address: Option<AddressInput>,
    #[serde(default)]
    pub address_id: Option<AddressId>,
    /// Keep a new address in the address book.
    #[serde(default)]
    pub save_address: bool,
}

/// What the browser needs to open the payment widget.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub order: Order,
    pub gateway_order_id: String,
    pub key_id: String,
    /// Amount in paise.
    pub amount: i64,
    pub currency: &'static str,
}

pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    session: &'a Session,
    shipping: &'a ShippingPolicy,
    gateway: &'a RazorpayClient,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        session: &'a Session,
        shipping: &'a ShippingPolicy,
        gateway: &'a RazorpayClient,
    ) -> Self {
        Self {
            pool,
            session,
            shipping,
            gateway,
        }
    }

    /// Place an order for the user's cart and open a gateway payment.
    ///
    /// If the cart no longer matches the catalog it is corrected and saved,
    /// and the order is refused so the customer can review the new totals.
    ///
    /// # Errors
    ///
    /// - `CartError::Empty` if the cart is empty
    /// - `AppError::Conflict` if reconciliation changed the cart
    /// - `AddressError` for an invalid address
    /// - `RazorpayError` if the gateway order cannot be created; the order
    ///   then stays `CREATED` and can be retried
    #[instrument(skip(self, request))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        request: PlaceOrderRequest,
    ) -> Result<PaymentIntent> {
        let carts = CartService::new(self.pool, self.session, self.shipping);
        let owner = CartOwner::User(user_id);
        let ReconciledCart {
            cart,
            catalog,
            adjustments,
        } = carts.reconciled(owner).await?;

        if !adjustments.is_empty() {
            carts.save(owner, &cart).await?;
            return Err(AppError::Conflict(
                "Your cart changed because of stock or availability updates. Please review it before paying."
                    .to_string(),
            ));
        }
        if cart.is_empty() {
            return Err(CartError::Empty.into());
        }

        let address = self.shipping_address(user_id, request).await?;
        let summary = price_cart(&cart, &catalog, self.shipping)?;

        let order = OrderRepository::new(self.pool)
            .create(user_id, &address, &summary)
            .await?;
        info!(order_id = %order.id, total = %order.total, "Order created");
        let order_ref = order.id.to_string();
        add_breadcrumb(
            "checkout",
            "Order created",
            Some(&[("order_id", order_ref.as_str())]),
        );

        self.start_payment(order, user_id).await
    }

    /// Open a new gateway payment for an unpaid order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order is not the user's and
    /// `AppError::Conflict` unless it is `CREATED` or `PAYMENT_FAILED`.
    #[instrument(skip(self))]
    pub async fn retry_payment(&self, user_id: UserId, order_id: OrderId) -> Result<PaymentIntent> {
        let order = OrderRepository::new(self.pool)
            .get_for_user(user_id, order_id)
            .await?;
        if !matches!(
            order.status,
            OrderStatus::Created | OrderStatus::PaymentFailed
        ) {
            return Err(AppError::Conflict(format!(
                "Payment cannot be retried for an order that is {}",
                order.status
            )));
        }
        self.start_payment(order, user_id).await
    }

    /// Cancel one of the user's orders.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` if the order can no longer be cancelled
    /// by the customer.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let order = OrderRepository::new(self.pool)
            .get_for_user(user_id, order_id)
            .await?;
        if order.status == OrderStatus::Cancelled {
            return Ok(order);
        }
        if !order.status.is_customer_cancellable() {
            return Err(AppError::Conflict(format!(
                "An order that is {} can no longer be cancelled",
                order.status
            )));
        }
        OrderService::new(self.pool)
            .transition(
                order,
                OrderStatus::Cancelled,
                TransitionContext::by(user_id).with_note("cancelled by customer"),
            )
            .await
    }

    async fn start_payment(&self, order: Order, user_id: UserId) -> Result<PaymentIntent> {
        let gateway_order = match self.gateway.create_order(order.id, order.total).await {
            Ok(gateway_order) => gateway_order,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Could not open gateway payment");
                return Err(e.into());
            }
        };

        OrderRepository::new(self.pool)
            .set_gateway_order(order.id, &gateway_order.id)
            .await?;

        let order = OrderService::new(self.pool)
            .transition(
                order,
                OrderStatus::PaymentPending,
                TransitionContext::by(user_id),
            )
            .await?;

        Ok(PaymentIntent {
            currency: order.currency.code(),
            order,
            amount: gateway_order.amount,
            gateway_order_id: gateway_order.id,
            key_id: self.gateway.key_id().to_string(),
        })
    }

    async fn shipping_address(
        &self,
        user_id: UserId,
        request: PlaceOrderRequest,
    ) -> Result<ShippingAddress> {
        match (request.address, request.address_id) {
            (Some(input), _) => {
                let address = ShippingAddress::try_from(input)?;
                if request.save_address {
                    AddressRepository::new(self.pool)
                        .create(user_id, &address, false)
                        .await?;
                }
                Ok(address)
            }
            (None, Some(id)) => Ok(AddressRepository::new(self.pool)
                .get(user_id, id)
                .await?
                .address),
            (None, None) => Err(AppError::BadRequest(
                "A shipping address is required".to_string(),
            )),
        }
    }
}
