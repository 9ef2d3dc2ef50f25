//! Status enums: the order lifecycle and user roles.
//!
//! # Order lifecycle
//!
//! ```text
//! CREATED -> PAYMENT_PENDING -> PAYMENT_SUCCESS -> CONFIRMED -> SHIPPED -> DELIVERED
//!                 |    ^
//!                 v    |
//!            PAYMENT_FAILED
//!
//! CANCELLED <- CREATED | PAYMENT_PENDING | PAYMENT_FAILED | PAYMENT_SUCCESS | CONFIRMED
//! REFUNDED  <- PAYMENT_SUCCESS | CONFIRMED | SHIPPED | DELIVERED | CANCELLED
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    PaymentPending,
    PaymentSuccess,
    PaymentFailed,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

/// Rejected status change.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot move order from {from} to {to}")]
pub struct StatusTransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Outcome of a permitted status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The order moves to a new status.
    Changed { from: OrderStatus, to: OrderStatus },
    /// The order already has the requested status; nothing to write.
    Unchanged(OrderStatus),
}

impl OrderStatus {
    pub const ALL: [Self; 9] = [
        Self::Created,
        Self::PaymentPending,
        Self::PaymentSuccess,
        Self::PaymentFailed,
        Self::Confirmed,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Refunded,
    ];

    /// Statuses directly reachable from `self`.
    #[must_use]
    pub const fn successors(self) -> &'static [Self] {
        match self {
            Self::Created => &[Self::PaymentPending, Self::Cancelled],
            Self::PaymentPending => &[Self::PaymentSuccess, Self::PaymentFailed, Self::Cancelled],
            Self::PaymentFailed => &[Self::PaymentPending, Self::Cancelled],
            Self::PaymentSuccess => &[Self::Confirmed, Self::Cancelled, Self::Refunded],
            Self::Confirmed => &[Self::Shipped, Self::Cancelled, Self::Refunded],
            Self::Shipped => &[Self::Delivered, Self::Refunded],
            Self::Delivered => &[Self::Refunded],
            Self::Cancelled => &[Self::Refunded],
            Self::Refunded => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.successors().contains(&next)
    }

    /// Validate a status change.
    ///
    /// Requesting the current status is accepted as [`Transition::Unchanged`]
    /// so that repeated payment callbacks are harmless.
    ///
    /// # Errors
    ///
    /// Returns [`StatusTransitionError`] if `next` is not reachable from `self`.
    pub fn transition(self, next: Self) -> Result<Transition, StatusTransitionError> {
        if self == next {
            return Ok(Transition::Unchanged(self));
        }
        if self.can_transition_to(next) {
            Ok(Transition::Changed {
                from: self,
                to: next,
            })
        } else {
            Err(StatusTransitionError {
                from: self,
                to: next,
            })
        }
    }

    /// No further transitions except a refund.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Refunded | Self::Cancelled)
    }

    /// Payment has been captured for this order at some point.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(
            self,
            Self::PaymentSuccess | Self::Confirmed | Self::Shipped | Self::Delivered
        )
    }

    /// A customer may cancel their own order in this status.
    #[must_use]
    pub const fn is_customer_cancellable(self) -> bool {
        matches!(
            self,
            Self::Created | Self::PaymentPending | Self::PaymentFailed | Self::Confirmed
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::PaymentPending => "PAYMENT_PENDING",
            Self::PaymentSuccess => "PAYMENT_SUCCESS",
            Self::PaymentFailed => "PAYMENT_FAILED",
            Self::Confirmed => "CONFIRMED",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Storefront user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shopper: browse, cart, checkout, own orders.
    #[default]
    Customer,
    /// Back-office access to catalog and all orders.
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let path = [
            OrderStatus::Created,
            OrderStatus::PaymentPending,
            OrderStatus::PaymentSuccess,
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ];
        for pair in path.windows(2) {
            if let [from, to] = pair {
                assert!(from.can_transition_to(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_payment_retry() {
        assert!(OrderStatus::PaymentPending.can_transition_to(OrderStatus::PaymentFailed));
        assert!(OrderStatus::PaymentFailed.can_transition_to(OrderStatus::PaymentPending));
    }

    #[test]
    fn test_no_going_back() {
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Created.can_transition_to(OrderStatus::PaymentSuccess));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_refunded_is_final() {
        for status in OrderStatus::ALL {
            assert!(!OrderStatus::Refunded.can_transition_to(status));
        }
    }

    #[test]
    fn test_same_status_is_unchanged() {
        assert_eq!(
            OrderStatus::PaymentSuccess.transition(OrderStatus::PaymentSuccess),
            Ok(Transition::Unchanged(OrderStatus::PaymentSuccess))
        );
    }

    #[test]
    fn test_illegal_transition_error() {
        let err = OrderStatus::Delivered
            .transition(OrderStatus::Cancelled)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot move order from DELIVERED to CANCELLED");
    }

    #[test]
    fn test_parse_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!(
            "payment_failed".parse::<OrderStatus>().unwrap(),
            OrderStatus::PaymentFailed
        );
        assert!("LOST".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_as_str() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_user_role_roundtrip() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!(UserRole::Customer.to_string(), "customer");
        assert!("root".parse::<UserRole>().is_err());
    }
}
