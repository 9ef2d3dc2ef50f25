//! Business logic services for the storefront.
//!
//! Services sit between route handlers and repositories. They are cheap,
//! per-request values borrowing the pool (and session, where needed).
//!
//! - `identity` - Bearer token resolution against the auth provider
//! - `cart` - Guest and user carts, reconciliation and login merge
//! - `orders` - Order status changes with their stock effects
//! - `checkout` - Order placement, payment retry and cancellation
//! - `payments` - Checkout callbacks and gateway webhooks

pub mod cart;
pub mod checkout;
pub mod identity;
pub mod orders;
pub mod payments;
