//! Gateway request, response and webhook payloads.

use serde::{Deserialize, Serialize};

/// Body of `POST /v1/orders`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest<'a> {
    /// Amount in minor units (paise).
    pub amount: i64,
    pub currency: &'a str,
    pub receipt: &'a str,
    pub notes: OrderNotes,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderNotes {
    pub order_id: String,
}

/// A gateway order, as returned by `POST /v1/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
}

/// Error body returned by the gateway API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    payment: Option<Wrapped<PaymentEntity>>,
    refund: Option<Wrapped<RefundEntity>>,
}

#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundEntity {
    id: String,
    payment_id: String,
}

/// A webhook event the storefront acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentCaptured {
        gateway_order_id: String,
        payment_id: String,
    },
    PaymentFailed {
        gateway_order_id: String,
        payment_id: String,
        reason: Option<String>,
    },
    RefundProcessed {
        gateway_order_id: String,
        payment_id: String,
        refund_id: String,
    },
    /// Any other event, or one without an order reference. Acknowledged
    /// and ignored.
    Ignored(String),
}

impl WebhookEvent {
    /// Parse a webhook body.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the body is not a webhook envelope.
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_slice(body)?;
        let payment = envelope.payload.payment.map(|w| w.entity);

        let event = match (envelope.event.as_str(), payment) {
            (
                "payment.captured",
                Some(PaymentEntity {
                    id,
                    order_id: Some(gateway_order_id),
                    ..
                }),
            ) => Self::PaymentCaptured {
                gateway_order_id,
                payment_id: id,
            },
            (
                "payment.failed",
                Some(PaymentEntity {
                    id,
                    order_id: Some(gateway_order_id),
                    error_description,
                }),
            ) => Self::PaymentFailed {
                gateway_order_id,
                payment_id: id,
                reason: error_description,
            },
            (
                "refund.processed",
                Some(PaymentEntity {
                    order_id: Some(gateway_order_id),
                    ..
                }),
            ) => match envelope.payload.refund {
                Some(Wrapped { entity: refund }) => Self::RefundProcessed {
                    gateway_order_id,
                    payment_id: refund.payment_id,
                    refund_id: refund.id,
                },
                None => Self::Ignored(envelope.event),
            },
            _ => Self::Ignored(envelope.event),
        };
        Ok(event)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: &serde_json::Value) -> WebhookEvent {
        WebhookEvent::parse(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_payment_captured() {
        let event = parse(&json!({
            "entity": "event",
            "event": "payment.captured",
            "payload": {"payment": {"entity": {
                "id": "pay_1", "order_id": "order_1", "status": "captured", "amount": 54900
            }}}
        }));
        assert_eq!(
            event,
            WebhookEvent::PaymentCaptured {
                gateway_order_id: "order_1".to_string(),
                payment_id: "pay_1".to_string(),
            }
        );
    }

    #[test]
    fn test_payment_failed_carries_reason() {
        let event = parse(&json!({
            "event": "payment.failed",
            "payload": {"payment": {"entity": {
                "id": "pay_2", "order_id": "order_2",
                "error_description": "Payment was declined by the bank"
            }}}
        }));
        assert!(matches!(
            event,
            WebhookEvent::PaymentFailed { reason: Some(ref r), .. } if r.contains("declined")
        ));
    }

    #[test]
    fn test_refund_processed() {
        let event = parse(&json!({
            "event": "refund.processed",
            "payload": {
                "refund": {"entity": {"id": "rfnd_1", "payment_id": "pay_3"}},
                "payment": {"entity": {"id": "pay_3", "order_id": "order_3"}}
            }
        }));
        assert_eq!(
            event,
            WebhookEvent::RefundProcessed {
                gateway_order_id: "order_3".to_string(),
                payment_id: "pay_3".to_string(),
                refund_id: "rfnd_1".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_and_orderless_events_are_ignored() {
        assert_eq!(
            parse(&json!({"event": "order.paid", "payload": {}})),
            WebhookEvent::Ignored("order.paid".to_string())
        );
        assert_eq!(
            parse(&json!({
                "event": "payment.captured",
                "payload": {"payment": {"entity": {"id": "pay_4", "order_id": null}}}
            })),
            WebhookEvent::Ignored("payment.captured".to_string())
        );
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(WebhookEvent::parse(b"not json").is_err());
    }
}
