//! Domain models for the storefront API.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`]. All of them serialize to the JSON shapes the API returns.

pub mod catalog;
pub mod order;
pub mod session;
pub mod user;

pub use catalog::{CategoryCount, Combo, ComboItem, Product, Variant};
pub use order::{Order, OrderItem, StatusChange};
pub use session::{CurrentUser, keys as session_keys};
pub use user::{SavedAddress, User};
