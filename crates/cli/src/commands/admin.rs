//! User role management.
//!
//! Users are created on first sign-in, so a user must have signed in once
//! before they can be promoted.

use milletmart_core::{ContactError, Email, UserRole};
use milletmart_storefront::db::RepositoryError;
use milletmart_storefront::db::users::UserRepository;
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur during role changes.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] ContactError),

    #[error("No user with email {0}; they must sign in once first")]
    UnknownUser(String),

    #[error("Database error: {0}")]
    Repository(RepositoryError),
}

/// Set the role of the user with `email`.
///
/// # Errors
///
/// Returns `AdminError::UnknownUser` if nobody has signed in with `email`.
pub async fn set_role(email: &str, role: UserRole) -> Result<(), AdminError> {
    let email = Email::parse(email)?;
    let pool = connect().await?;

    let user = UserRepository::new(&pool)
        .set_role(&email, role)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UnknownUser(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "Role updated");
    tracing::info!("Cached sessions pick up the new role within a minute.");
    Ok(())
}
