//! Core types for MilletMart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod contact;
pub mod id;
pub mod money;
pub mod status;

pub use address::{AddressError, AddressInput, ShippingAddress};
pub use contact::{ContactError, Email, PhoneNumber, PostalCode};
pub use id::*;
pub use money::{Currency, Money, MoneyError, validate_discount};
pub use status::*;
