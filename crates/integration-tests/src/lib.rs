//! Integration tests for the MilletMart storefront.
//!
//! The harness drives the real router, middleware included, in process.
//! Sessions live in a `MemoryStore` and the database pool is created
//! lazily, so tests that never reach a repository need no `PostgreSQL`.
//! Signed-in users are seeded straight into the identity cache instead of
//! going through the auth provider.
//!
//! ```bash
//! cargo test -p milletmart-integration-tests
//! ```

use std::path::Path;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header::AUTHORIZATION},
};
use hmac::{Hmac, Mac};
use milletmart_core::cart::ShippingPolicy;
use milletmart_core::{Email, UserId, UserRole};
use milletmart_storefront::config::{AuthProviderConfig, RazorpayConfig, StorefrontConfig};
use milletmart_storefront::middleware::create_session_layer;
use milletmart_storefront::models::CurrentUser;
use milletmart_storefront::state::AppState;
use milletmart_storefront::build_router;
use secrecy::SecretString;
use serde_json::Value;
use sha2::Sha256;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;
use tower_sessions::MemoryStore;
use uuid::Uuid;

/// Webhook secret used by [`test_config`].
pub const WEBHOOK_SECRET: &str = "wH6$nB3^mR8&xC1j-test";

/// Largest response body the helpers will buffer.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Configuration pointing at nothing real.
#[must_use]
pub fn test_config(content_dir: &Path) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/milletmart_unused"),
        host: [127, 0, 0, 1].into(),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        frontend_origin: "http://localhost:5173".to_string(),
        content_dir: content_dir.to_path_buf(),
        rate_limit: false,
        auth: AuthProviderConfig {
            url: "https://auth.example.test".to_string(),
            anon_key: SecretString::from("anon-key-for-tests"),
        },
        razorpay: RazorpayConfig {
            api_base: "https://gateway.example.test/".to_string(),
            key_id: "rzp_test_integration".to_string(),
            key_secret: SecretString::from("kS9!vT2#pL7@qW4z-test"),
            webhook_secret: SecretString::from(WEBHOOK_SECRET),
        },
        shipping: ShippingPolicy::default(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A storefront router with its state and content directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _content: TempDir,
}

impl TestApp {
    /// App with an empty blog.
    pub fn new() -> Self {
        Self::with_posts(&[])
    }

    /// App whose blog holds `posts`, given as `(file stem, markdown)`.
    ///
    /// # Panics
    ///
    /// Panics if the temporary content directory cannot be written or the
    /// state cannot be built.
    pub fn with_posts(posts: &[(&str, &str)]) -> Self {
        let content = tempfile::tempdir().expect("Failed to create content dir");
        let blog = content.path().join("blog");
        std::fs::create_dir(&blog).expect("Failed to create blog dir");
        for (stem, source) in posts {
            std::fs::write(blog.join(format!("{stem}.md")), source)
                .expect("Failed to write post");
        }

        let config = test_config(content.path());
        let pool = PgPool::connect_lazy("postgres://localhost/milletmart_unused")
            .expect("Failed to create lazy pool");
        let session_layer = create_session_layer(MemoryStore::default(), &config);
        let state = AppState::new(config, pool).expect("Failed to build state");

        Self {
            router: build_router(state.clone(), session_layer),
            state,
            _content: content,
        }
    }

    /// Seed a signed-in user and return their bearer token.
    pub async fn sign_in(&self, email: &str, role: UserRole) -> String {
        let token = format!("token-{}", Uuid::new_v4());
        let user = CurrentUser {
            id: UserId::new(Uuid::new_v4()),
            email: Email::parse(email).expect("Invalid test email"),
            role,
        };
        self.state.identity().remember(&token, user).await;
        token
    }

    /// Send a request through the full middleware stack.
    ///
    /// # Panics
    ///
    /// Panics if the router fails, which it never does for a well-formed
    /// request.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(request("GET", uri, None).body(Body::empty()).expect("Invalid request"))
            .await
    }

    pub async fn get_as(&self, uri: &str, token: &str) -> Response<Body> {
        self.send(
            request("GET", uri, Some(token))
                .body(Body::empty())
                .expect("Invalid request"),
        )
        .await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Request builder, optionally carrying a bearer token.
#[must_use]
pub fn request(method: &str, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match token {
        Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

/// Buffer a response body as JSON.
///
/// # Panics
///
/// Panics if the body cannot be read or is not JSON.
pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), MAX_BODY_BYTES)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// Buffer a response body as text.
///
/// # Panics
///
/// Panics if the body cannot be read or is not UTF-8.
pub async fn text_body(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), MAX_BODY_BYTES)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

/// Hex HMAC-SHA256 of `body` under [`WEBHOOK_SECRET`], as the gateway sends it.
///
/// # Panics
///
/// Never in practice: HMAC accepts keys of any length.
#[must_use]
pub fn sign_webhook(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
