//! MilletMart Core - Shared domain library.
//!
//! This crate provides the domain types used across all MilletMart components:
//! - `storefront` - Public JSON API, checkout and admin back-office
//! - `cli` - Command-line tools for migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Cart arithmetic, pricing and the order status
//! machine live here so they can be tested without a running server.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, contact details, addresses, statuses
//! - [`cart`] - Cart lines, merging, reconciliation and pricing

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use types::*;
