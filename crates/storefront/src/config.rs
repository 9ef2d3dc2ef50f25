//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MILLETMART_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `MILLETMART_BASE_URL` - Public URL of this API
//! - `AUTH_URL` - Base URL of the auth provider
//! - `AUTH_ANON_KEY` - Auth provider project key, sent as `apikey`
//! - `RAZORPAY_KEY_ID` - Payment gateway key id (public, sent to the checkout widget)
//! - `RAZORPAY_KEY_SECRET` - Payment gateway key secret (high entropy)
//! - `RAZORPAY_WEBHOOK_SECRET` - Webhook signing secret (high entropy)
//!
//! ## Optional
//! - `MILLETMART_HOST` - Bind address (default: 127.0.0.1)
//! - `MILLETMART_PORT` - Listen port (default: 3000)
//! - `MILLETMART_FRONTEND_ORIGIN` - Origin allowed by CORS (default: base URL)
//! - `MILLETMART_CONTENT_DIR` - Blog content root (default: crates/storefront/content)
//! - `MILLETMART_RATE_LIMIT` - Enable per-IP rate limiting (default: true)
//! - `RAZORPAY_API_BASE` - Gateway API base (default: <https://api.razorpay.com>)
//! - `SHIPPING_FLAT_FEE` - Shipping fee in rupees (default: 50)
//! - `SHIPPING_FREE_THRESHOLD` - Subtotal for free shipping (default: 499)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use milletmart_core::Money;
use milletmart_core::cart::ShippingPolicy;
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: String,
    /// Browser origin allowed to call the API with credentials
    pub frontend_origin: String,
    /// Directory holding `blog/*.md`
    pub content_dir: PathBuf,
    /// Whether per-IP rate limiting is applied
    pub rate_limit: bool,
    /// Auth provider configuration
    pub auth: AuthProviderConfig,
    /// Payment gateway configuration
    pub razorpay: RazorpayConfig,
    /// Shipping fee rules
    pub shipping: ShippingPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production")
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Hosted auth provider that issues bearer tokens.
///
/// Implements `Debug` manually to redact the project key.
#[derive(Clone)]
pub struct AuthProviderConfig {
    /// Provider base URL (e.g. `https://project.supabase.co`)
    pub url: String,
    /// Project key sent as the `apikey` header
    pub anon_key: SecretString,
}

impl std::fmt::Debug for AuthProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProviderConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

/// Razorpay-compatible payment gateway credentials.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct RazorpayConfig {
    /// API base URL
    pub api_base: String,
    /// Key id (safe to expose to the checkout widget)
    pub key_id: String,
    /// Key secret, also used to sign payment callbacks
    pub key_secret: SecretString,
    /// Secret used to sign webhook bodies
    pub webhook_secret: SecretString,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("MILLETMART_DATABASE_URL")?;
        let host = parse_env("MILLETMART_HOST", "127.0.0.1")?;
        let port = parse_env("MILLETMART_PORT", "3000")?;
        let base_url = get_required_env("MILLETMART_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("MILLETMART_BASE_URL".to_string(), e.to_string())
        })?;
        let frontend_origin = get_optional_env("MILLETMART_FRONTEND_ORIGIN")
            .unwrap_or_else(|| base_url.clone());
        let frontend_origin = parse_origin("MILLETMART_FRONTEND_ORIGIN", &frontend_origin)?;
        let content_dir = PathBuf::from(get_env_or_default(
            "MILLETMART_CONTENT_DIR",
            "crates/storefront/content",
        ));
        let rate_limit = parse_env("MILLETMART_RATE_LIMIT", "true")?;

        let shipping = ShippingPolicy::new(
            parse_rupees("SHIPPING_FLAT_FEE", "50")?,
            parse_rupees("SHIPPING_FREE_THRESHOLD", "499")?,
        );

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            frontend_origin,
            content_dir,
            rate_limit,
            auth: AuthProviderConfig::from_env()?,
            razorpay: RazorpayConfig::from_env()?,
            shipping,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl AuthProviderConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: get_required_env("AUTH_URL")?
                .trim_end_matches('/')
                .to_string(),
            anon_key: get_required_secret("AUTH_ANON_KEY")?,
        })
    }
}

impl RazorpayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: get_env_or_default("RAZORPAY_API_BASE", "https://api.razorpay.com")
                .trim_end_matches('/')
                .to_string(),
            key_id: get_required_env("RAZORPAY_KEY_ID")?,
            key_secret: get_validated_secret("RAZORPAY_KEY_SECRET")?,
            webhook_secret: get_validated_secret("RAZORPAY_WEBHOOK_SECRET")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, using `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a non-negative rupee amount.
fn parse_rupees(key: &str, default: &str) -> Result<Money, ConfigError> {
    let amount: Decimal = parse_env(key, default)?;
    Money::non_negative(amount)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Normalize a URL to its `scheme://host[:port]` origin.
fn parse_origin(key: &str, value: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    match url.origin() {
        origin @ url::Origin::Tuple(..) => Ok(origin.ascii_serialization()),
        url::Origin::Opaque(_) => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "not an http(s) origin".to_string(),
        )),
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-razorpay-secret", "RAZORPAY_KEY_SECRET")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        assert!(validate_secret_strength("abababababababababab", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("Zq8vR2mW9tLx4NcB7hKp3JsD", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_razorpay_debug_redacts_secrets() {
        let config = RazorpayConfig {
            api_base: "https://api.razorpay.com".to_string(),
            key_id: "rzp_test_visiblekey".to_string(),
            key_secret: SecretString::from("hidden_key_secret_value"),
            webhook_secret: SecretString::from("hidden_webhook_secret_value"),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("rzp_test_visiblekey"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hidden_key_secret_value"));
        assert!(!debug_output.contains("hidden_webhook_secret_value"));
    }

    #[test]
    fn test_auth_debug_redacts_key() {
        let config = AuthProviderConfig {
            url: "https://auth.milletmart.test".to_string(),
            anon_key: SecretString::from("anon-key-value"),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("auth.milletmart.test"));
        assert!(!debug_output.contains("anon-key-value"));
    }

    #[test]
    fn test_parse_origin() {
        assert_eq!(
            parse_origin("X", "https://milletmart.in/shop/").unwrap(),
            "https://milletmart.in"
        );
        assert_eq!(
            parse_origin("X", "http://localhost:5173").unwrap(),
            "http://localhost:5173"
        );
        assert!(parse_origin("X", "not a url").is_err());
        assert!(parse_origin("X", "data:text/plain,hi").is_err());
    }

    #[test]
    fn test_parse_rupees_rejects_negative() {
        // Unset key falls back to the default
        assert!(parse_rupees("MILLETMART_TEST_UNSET_FEE", "-5").is_err());
        assert_eq!(
            parse_rupees("MILLETMART_TEST_UNSET_FEE", "49.5").unwrap(),
            Money::inr("49.5".parse().unwrap())
        );
    }
}
