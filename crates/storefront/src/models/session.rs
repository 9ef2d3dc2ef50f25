//! Request identity and session keys.

use serde::{Deserialize, Serialize};

use milletmart_core::{Email, UserId, UserRole};

/// The signed-in user behind a bearer token.
///
/// Resolved once per token and cached; see
/// [`IdentityService`](crate::services::identity::IdentityService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Session keys.
pub mod keys {
    /// Serialized guest [`Cart`](milletmart_core::cart::Cart).
    pub const GUEST_CART: &str = "guest_cart";

    /// User id whose cart already absorbed this session's guest cart.
    pub const CART_MERGED_FOR: &str = "cart_merged_for";
}
