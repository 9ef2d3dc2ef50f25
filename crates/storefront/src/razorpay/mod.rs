//! Razorpay payment gateway client.
//!
//! # Flow
//!
//! 1. Checkout creates a gateway order for the order total (in paise) and
//!    hands its id and our public key id to the browser widget.
//! 2. The widget reports back with `razorpay_order_id`,
//!    `razorpay_payment_id` and `razorpay_signature`, which we verify
//!    with [`RazorpayClient::verify_payment`].
//! 3. Webhooks arrive independently and are verified with
//!    [`RazorpayClient::verify_webhook`] before [`WebhookEvent::parse`].

pub mod signature;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, instrument};

use milletmart_core::{Money, MoneyError, OrderId};

use crate::config::RazorpayConfig;

pub use types::{GatewayOrder, WebhookEvent};

/// Errors that can occur when talking to the gateway.
#[derive(Debug, Error)]
pub enum RazorpayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Failed to parse a response.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Amount cannot be expressed in paise.
    #[error("Invalid amount: {0}")]
    Amount(#[from] MoneyError),
}

/// Client for the gateway's orders API and signature checks.
#[derive(Clone)]
pub struct RazorpayClient {
    inner: Arc<RazorpayClientInner>,
}

struct RazorpayClientInner {
    client: reqwest::Client,
    orders_url: String,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: SecretString,
}

impl RazorpayClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &RazorpayConfig) -> Result<Self, RazorpayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            inner: Arc::new(RazorpayClientInner {
                client,
                orders_url: format!("{}/v1/orders", config.api_base.trim_end_matches('/')),
                key_id: config.key_id.clone(),
                key_secret: config.key_secret.clone(),
                webhook_secret: config.webhook_secret.clone(),
            }),
        })
    }

    /// Public key id for the checkout widget.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.inner.key_id
    }

    /// Create a gateway order for `amount`, tagged with our order id.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::Api` if the gateway rejects the request.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn create_order(
        &self,
        order_id: OrderId,
        amount: Money,
    ) -> Result<GatewayOrder, RazorpayError> {
        let receipt = format!("order_{order_id}");
        let body = types::CreateOrderRequest {
            amount: amount.to_minor_units()?,
            currency: amount.currency.code(),
            receipt: &receipt,
            notes: types::OrderNotes {
                order_id: order_id.to_string(),
            },
        };

        let response = self
            .inner
            .client
            .post(&self.inner.orders_url)
            .basic_auth(&self.inner.key_id, Some(self.inner.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let (code, message) = match serde_json::from_str::<types::ApiErrorBody>(&text) {
                Ok(body) => (body.error.code, body.error.description),
                Err(_) => (String::new(), text.chars().take(200).collect()),
            };
            tracing::error!(status = %status, code = %code, message = %message, "Gateway rejected order");
            return Err(RazorpayError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        let order: GatewayOrder = serde_json::from_str(&text)?;
        debug!(gateway_order_id = %order.id, amount = order.amount, "Created gateway order");
        Ok(order)
    }

    /// Verify a checkout callback signature.
    #[must_use]
    pub fn verify_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool {
        signature::verify(
            self.inner.key_secret.expose_secret().as_bytes(),
            signature::payment_message(gateway_order_id, gateway_payment_id).as_bytes(),
            signature,
        )
    }

    /// Verify a webhook body against its `X-Razorpay-Signature` header.
    #[must_use]
    pub fn verify_webhook(&self, body: &[u8], signature: &str) -> bool {
        signature::verify(
            self.inner.webhook_secret.expose_secret().as_bytes(),
            body,
            signature,
        )
    }
}
