//! Bearer token resolution.
//!
//! The auth provider owns sign-up and sign-in. A request proves who it is
//! with the provider's access token; we ask the provider who that is, make
//! sure a matching `app_user` row exists, and cache the answer briefly so a
//! page full of API calls costs one round trip.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use axum::http::StatusCode;
use milletmart_core::{ContactError, Email, UserId};

use crate::config::AuthProviderConfig;
use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::CurrentUser;

/// How long a resolved token is trusted without asking the provider again.
const TOKEN_TTL: Duration = Duration::from_secs(60);

/// Errors from resolving a bearer token.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider does not recognise the token.
    #[error("invalid or expired token")]
    InvalidToken,

    /// The provider's user has no usable email.
    #[error("account email is missing or invalid: {0}")]
    Email(#[from] ContactError),

    /// The provider could not be reached.
    #[error("auth provider request failed: {0}")]
    Provider(#[from] reqwest::Error),

    /// The provider answered with an unexpected status.
    #[error("auth provider returned {0}")]
    ProviderStatus(u16),

    /// Storing the user failed.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl IdentityError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidToken | Self::Email(_) => StatusCode::UNAUTHORIZED,
            Self::Provider(_) | Self::ProviderStatus(_) => StatusCode::BAD_GATEWAY,
            Self::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidToken => "Invalid or expired session, please sign in again",
            Self::Email(_) => "Your account has no valid email address",
            Self::Provider(_) | Self::ProviderStatus(_) => "Sign-in service unavailable",
            Self::Repository(RepositoryError::Conflict(_)) => {
                "This email is linked to another account"
            }
            Self::Repository(_) => "Internal server error",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: Uuid,
    email: Option<String>,
}

/// Resolves bearer tokens to [`CurrentUser`]s.
#[derive(Clone)]
pub struct IdentityService {
    inner: Arc<IdentityServiceInner>,
}

struct IdentityServiceInner {
    client: reqwest::Client,
    user_url: String,
    anon_key: SecretString,
    cache: Cache<String, CurrentUser>,
}

impl IdentityService {
    /// Create a new identity service.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &AuthProviderConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(TOKEN_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(IdentityServiceInner {
                client,
                user_url: format!("{}/auth/v1/user", config.url.trim_end_matches('/')),
                anon_key: config.anon_key.clone(),
                cache,
            }),
        })
    }

    /// Resolve a bearer token, creating the local user on first sight.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidToken` if the provider rejects the token.
    #[instrument(skip_all)]
    pub async fn resolve(&self, pool: &PgPool, token: &str) -> Result<CurrentUser, IdentityError> {
        let key = cache_key(token);
        if let Some(user) = self.inner.cache.get(&key).await {
            return Ok(user);
        }

        let provider_user = self.fetch_provider_user(token).await?;
        let email = Email::parse(provider_user.email.as_deref().unwrap_or_default())?;
        let user = UserRepository::new(pool)
            .upsert(UserId::new(provider_user.id), &email)
            .await?;

        let current = CurrentUser {
            id: user.id,
            email: user.email,
            role: user.role,
        };
        debug!(user_id = %current.id, role = %current.role, "Resolved bearer token");
        self.inner.cache.insert(key, current.clone()).await;
        Ok(current)
    }

    /// Cache `user` as the owner of `token`.
    pub async fn remember(&self, token: &str, user: CurrentUser) {
        self.inner.cache.insert(cache_key(token), user).await;
    }

    /// Drop any cached resolution of `token`.
    pub async fn forget(&self, token: &str) {
        self.inner.cache.invalidate(&cache_key(token)).await;
    }

    async fn fetch_provider_user(&self, token: &str) -> Result<ProviderUser, IdentityError> {
        let response = self
            .inner
            .client
            .get(&self.inner.user_url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IdentityError::InvalidToken);
        }
        tracing::warn!(status = %status, "Auth provider returned unexpected status");
        Err(IdentityError::ProviderStatus(status.as_u16()))
    }
}

/// Tokens are never kept in memory as-is.
fn cache_key(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use milletmart_core::UserRole;

    fn service() -> IdentityService {
        IdentityService::new(&AuthProviderConfig {
            url: "https://auth.example.test/".to_string(),
            anon_key: SecretString::from("anon-key"),
        })
        .unwrap()
    }

    #[test]
    fn test_cache_key_hides_token() {
        let key = cache_key("secret-token");
        assert_eq!(key.len(), 64);
        assert!(!key.contains("secret"));
        assert_eq!(key, cache_key("secret-token"));
    }

    #[test]
    fn test_user_url() {
        assert_eq!(
            service().inner.user_url,
            "https://auth.example.test/auth/v1/user"
        );
    }

    #[tokio::test]
    async fn test_remembered_token_resolves_without_provider() {
        let service = service();
        let user = CurrentUser {
            id: UserId::new(Uuid::nil()),
            email: Email::parse("asha@example.com").unwrap(),
            role: UserRole::Customer,
        };
        service.remember("tok", user.clone()).await;

        // Lazy pool: never touched on a cache hit
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        assert_eq!(service.resolve(&pool, "tok").await.unwrap(), user);

        service.forget("tok").await;
        assert!(service.inner.cache.get(&cache_key("tok")).await.is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(IdentityError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            IdentityError::ProviderStatus(500).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
