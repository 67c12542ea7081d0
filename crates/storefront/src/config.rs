//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_ADMIN_TOKEN` - Bearer token for `/admin` routes (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `SHOP_FREE_SHIPPING_THRESHOLD` - Subtotal from which shipping is free (default: 400000)
//! - `SHOP_FLAT_SHIPPING_FEE` - Shipping fee below the threshold (default: 25000)
//! - `SHOP_ORDER_NUMBER_PREFIX` - Order number prefix (default: ORD)
//! - `SHOP_UTC_OFFSET` - Shop timezone offset used to date order numbers (default: +07:00)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name (default: production)
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use chrono::{FixedOffset, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use pasar_core::{Money, OrderNumber, ShippingPolicy};

const MIN_SECRET_LENGTH: usize = 32;
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

/// Western Indonesia Time, UTC+7.
const WIB: FixedOffset = match FixedOffset::east_opt(7 * 3600) {
    Some(offset) => offset,
    None => unreachable!(),
};

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
    /// Public base URL for the storefront
    pub base_url: String,
    /// Bearer token accepted on `/admin` routes
    pub admin_token: SecretString,
    /// Pricing and numbering rules
    pub shop: ShopConfig,
    /// Error tracking
    pub sentry: SentryConfig,
}

/// Shop rules applied to carts and orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopConfig {
    /// Shipping charged per order
    pub shipping: ShippingPolicy,
    /// Prefix of every order number (e.g. `ORD` in `ORD-20261016-0001`)
    pub order_number_prefix: String,
    /// Offset of the shop's local time; order numbers carry the local date
    pub utc_offset: FixedOffset,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            shipping: ShippingPolicy::default(),
            order_number_prefix: "ORD".to_string(),
            utc_offset: WIB,
        }
    }
}

/// Sentry settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SentryConfig {
    /// Sentry DSN; error tracking is off without one
    pub dsn: Option<String>,
    /// Environment tag (e.g. production, staging)
    pub environment: String,
    /// Fraction of error events sent
    pub sample_rate: f32,
    /// Fraction of transactions traced
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: "production".to_string(),
            sample_rate: 1.0,
            traces_sample_rate: 0.1,
        }
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

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let admin_token = get_validated_secret("STOREFRONT_ADMIN_TOKEN")?;
        validate_secret_length(&admin_token, "STOREFRONT_ADMIN_TOKEN")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            admin_token,
            shop: ShopConfig::from_env()?,
            sentry: SentryConfig::from_env()?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ShopConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let free_threshold = parse_money(
            "SHOP_FREE_SHIPPING_THRESHOLD",
            &get_env_or_default("SHOP_FREE_SHIPPING_THRESHOLD", "400000"),
        )?;
        let flat_fee = parse_money(
            "SHOP_FLAT_SHIPPING_FEE",
            &get_env_or_default("SHOP_FLAT_SHIPPING_FEE", "25000"),
        )?;
        let prefix = parse_order_prefix(
            "SHOP_ORDER_NUMBER_PREFIX",
            &get_env_or_default("SHOP_ORDER_NUMBER_PREFIX", "ORD"),
        )?;
        let utc_offset = match get_optional_env("SHOP_UTC_OFFSET") {
            Some(value) => parse_utc_offset("SHOP_UTC_OFFSET", &value)?,
            None => WIB,
        };

        Ok(Self {
            shipping: ShippingPolicy::new(free_threshold, flat_fee),
            order_number_prefix: prefix,
            utc_offset,
        })
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
            environment: get_env_or_default("SENTRY_ENVIRONMENT", &defaults.environment),
            sample_rate: get_optional_env("SENTRY_SAMPLE_RATE")
                .map(|v| parse_rate("SENTRY_SAMPLE_RATE", &v))
                .transpose()?
                .unwrap_or(defaults.sample_rate),
            traces_sample_rate: get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
                .map(|v| parse_rate("SENTRY_TRACES_SAMPLE_RATE", &v))
                .transpose()?
                .unwrap_or(defaults.traces_sample_rate),
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

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., STOREFRONT_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL (set by Fly.io postgres attach)
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a non-negative amount of money.
fn parse_money(key: &str, value: &str) -> Result<Money, ConfigError> {
    let amount = value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if amount.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(Money::new(amount))
}

/// Parse an order number prefix, checking it can produce valid numbers.
fn parse_order_prefix(key: &str, value: &str) -> Result<String, ConfigError> {
    let prefix = value.trim().to_uppercase();
    OrderNumber::new(&prefix, Utc::now().date_naive(), 1)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(prefix)
}

/// Parse a fixed offset such as `+07:00`.
fn parse_utc_offset(key: &str, value: &str) -> Result<FixedOffset, ConfigError> {
    value
        .trim()
        .parse::<FixedOffset>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a sample rate in `[0.0, 1.0]`.
fn parse_rate(key: &str, value: &str) -> Result<f32, ConfigError> {
    let rate = value
        .trim()
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 0.0 and 1.0 (got {rate})"),
        ));
    }
    Ok(rate)
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
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
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shannon_entropy_high() {
        // Random-looking string should have high entropy
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_changeme() {
        let result = validate_secret_strength("changeme123", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        // High-entropy random string
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length_too_short() {
        let secret = SecretString::from("short");
        let result = validate_secret_length(&secret, "TEST_SESSION");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_length_valid() {
        let secret = SecretString::from("a".repeat(32));
        let result = validate_secret_length(&secret, "TEST_SESSION");
        assert!(result.is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            admin_token: SecretString::from("y".repeat(32)),
            shop: ShopConfig::default(),
            sentry: SentryConfig::default(),
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://pasar:hunter2@db/pasar"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            admin_token: SecretString::from("Hq4%Lm8!Vz2@Rt6#Wp1$Ky9^Bn3&Cx7"),
            shop: ShopConfig::default(),
            sentry: SentryConfig::default(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("http://localhost:3000"));
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("Hq4%Lm8"));
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(
            parse_money("FEE", " 25000 ").unwrap(),
            Money::from_units(25_000)
        );
        assert_eq!(
            parse_money("FEE", "12500.50").unwrap(),
            Money::new(Decimal::new(1_250_050, 2))
        );
        assert!(matches!(
            parse_money("FEE", "-1"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(parse_money("FEE", "gratis").is_err());
    }

    #[test]
    fn test_parse_order_prefix() {
        assert_eq!(parse_order_prefix("PREFIX", " inv ").unwrap(), "INV");
        assert!(parse_order_prefix("PREFIX", "ORD-X").is_err());
        assert!(parse_order_prefix("PREFIX", "").is_err());
    }

    #[test]
    fn test_parse_rate() {
        assert!((parse_rate("RATE", "0.25").unwrap() - 0.25).abs() < f32::EPSILON);
        assert!(parse_rate("RATE", "1.5").is_err());
        assert!(parse_rate("RATE", "often").is_err());
    }

    #[test]
    fn test_shop_defaults() {
        let shop = ShopConfig::default();
        assert_eq!(shop.order_number_prefix, "ORD");
        assert_eq!(shop.shipping, ShippingPolicy::default());
        assert_eq!(shop.utc_offset.local_minus_utc(), 7 * 3600);
    }

    #[test]
    fn test_parse_utc_offset() {
        let offset = parse_utc_offset("OFFSET", " +08:00 ").unwrap();
        assert_eq!(offset.local_minus_utc(), 8 * 3600);
        assert_eq!(parse_utc_offset("OFFSET", "-03:30").unwrap().local_minus_utc(), -(3 * 3600 + 1800));
        assert!(parse_utc_offset("OFFSET", "Asia/Jakarta").is_err());
    }
}
