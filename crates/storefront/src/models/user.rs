//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use milletmart_core::{AddressId, Email, ShippingAddress, UserId, UserRole};

/// A storefront user. The id is issued by the auth provider.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An address kept in a user's address book.
#[derive(Debug, Clone, Serialize)]
pub struct SavedAddress {
    pub id: AddressId,
    #[serde(flatten)]
    pub address: ShippingAddress,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}
