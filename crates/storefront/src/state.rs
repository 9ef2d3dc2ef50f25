//! Application state shared across handlers.

use std::sync::Arc;

use milletmart_core::cart::ShippingPolicy;
use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::content::{ContentError, ContentStore};
use crate::razorpay::{RazorpayClient, RazorpayError};
use crate::services::identity::{IdentityError, IdentityService};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway client: {0}")]
    Gateway(#[from] RazorpayError),
    #[error("identity service: {0}")]
    Identity(#[from] IdentityError),
    #[error("blog content: {0}")]
    Content(#[from] ContentError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    gateway: RazorpayClient,
    identity: IdentityService,
    content: ContentStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Builds the HTTP clients and loads blog posts from
    /// `config.content_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be built or the blog directory
    /// cannot be read.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let gateway = RazorpayClient::new(&config.razorpay)?;
        let identity = IdentityService::new(&config.auth)?;
        let content = ContentStore::load(&config.content_dir)?;
        tracing::info!(
            posts = content.published_posts().count(),
            "Blog content loaded"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                gateway,
                identity,
                content,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the payment gateway client.
    #[must_use]
    pub fn gateway(&self) -> &RazorpayClient {
        &self.inner.gateway
    }

    /// Get a reference to the bearer token resolver.
    #[must_use]
    pub fn identity(&self) -> &IdentityService {
        &self.inner.identity
    }

    /// Get a reference to the blog.
    #[must_use]
    pub fn content(&self) -> &ContentStore {
        &self.inner.content
    }

    /// Shipping fee rules.
    #[must_use]
    pub fn shipping(&self) -> &ShippingPolicy {
        &self.inner.config.shipping
    }
}
