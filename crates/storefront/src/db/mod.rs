//! Database operations for the storefront `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `app_user` - Users seen through the auth provider, with their role
//! - `saved_address` - Address book entries
//! - `product`, `product_variant` - Catalog
//! - `combo`, `combo_item` - Product bundles
//! - `cart_item` - Carts of signed-in users (guest carts live in the session)
//! - `orders`, `order_item`, `order_status_history` - Orders and their audit trail
//! - `tower_sessions.session` - Session storage (created by `mm-cli migrate`)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p milletmart-cli -- migrate
//! ```

pub mod addresses;
pub mod carts;
pub mod catalog;
pub mod combos;
pub mod orders;
pub mod products;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to [`RepositoryError::Conflict`].
    pub(crate) fn unique(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(e)
    }
}

/// Convert a non-negative database integer to `u32`.
pub(crate) fn to_u32(value: i32, what: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {what}: {value}")))
}

/// Convert a count or quantity to the `INTEGER` the schema stores.
pub(crate) fn to_i32(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::Conflict(format!("value {value} is out of range")))
}

/// 1-based page request, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub const DEFAULT_PER_PAGE: u32 = 24;
    pub const MAX_PER_PAGE: u32 = 100;

    #[must_use]
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(Self::DEFAULT_PER_PAGE)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_u32_rejects_negative() {
        assert!(matches!(
            to_u32(-1, "stock"),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert_eq!(to_u32(7, "stock").ok(), Some(7));
    }

    #[test]
    fn test_pagination_bounds() {
        let page = Pagination::new(Some(0), Some(1_000));
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, Pagination::MAX_PER_PAGE);
        assert_eq!(page.offset(), 0);

        let page = Pagination::new(Some(3), Some(10));
        assert_eq!(page.offset(), 20);
        assert_eq!(page.limit(), 10);
    }

    #[test]
    fn test_to_i32_range() {
        assert_eq!(to_i32(99).ok(), Some(99));
        assert!(to_i32(u32::MAX).is_err());
    }
}
