//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PAYFLOW_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `RAZORPAY_KEY` - Razorpay key id (public, sent to the checkout widget)
//! - `RAZORPAY_SECRET` - Razorpay key secret (API auth and signature verification)
//!
//! ## Optional
//! - `PAYFLOW_HOST` - Bind address (default: 127.0.0.1)
//! - `PAYFLOW_PORT` - Listen port (default: 8000)
//! - `RAZORPAY_API_BASE` - Gateway base URL (default: <https://api.razorpay.com/v1>)
//! - `PAYFLOW_GATEWAY_TIMEOUT_SECS` - Per-request gateway timeout (default: 10)
//! - `PAYFLOW_CORS_ORIGINS` - Comma-separated origins allowed to call the API
//! - `PAYFLOW_TRUSTED_USER_HEADER` - Header carrying the user id set by the auth proxy
//! - `PAYFLOW_NOTIFICATION_QUEUE_CAPACITY` - Outbound notification buffer (default: 256)
//! - `PAYFLOW_LOG_JSON` - Emit JSON logs when set
//! - `TWILIO_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_WHATSAPP_FROM`,
//!   `TWILIO_WHATSAPP_ALERT_TO` - WhatsApp payment alerts (all four or none)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_NOTIFICATION_QUEUE_CAPACITY: usize = 256;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
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

/// Payment server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Payment gateway credentials and transport settings
    pub razorpay: RazorpayConfig,
    /// WhatsApp alerting, if configured
    pub twilio: Option<TwilioConfig>,
    /// Browser origins allowed by CORS
    pub cors_origins: Vec<String>,
    /// Header an upstream auth proxy uses to pass the authenticated user id
    pub trusted_user_header: Option<String>,
    /// Capacity of the outbound notification queue
    pub notification_queue_capacity: usize,
    /// Emit JSON-formatted logs
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. production, staging)
    pub sentry_environment: Option<String>,
}

/// Razorpay API configuration.
///
/// Implements `Debug` manually to redact the key secret.
#[derive(Clone)]
pub struct RazorpayConfig {
    /// Key id, safe to expose to the browser checkout
    pub key_id: String,
    /// Key secret, server-side only
    pub key_secret: SecretString,
    /// API base URL
    pub api_base: Url,
    /// Timeout applied to every gateway request
    pub timeout: Duration,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Twilio WhatsApp configuration.
#[derive(Clone)]
pub struct TwilioConfig {
    /// Account SID
    pub account_sid: String,
    /// Auth token
    pub auth_token: SecretString,
    /// Sender number registered for WhatsApp
    pub whatsapp_from: String,
    /// Operations number that receives payment alerts
    pub alert_to: String,
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("whatsapp_from", &self.whatsapp_from)
            .field("alert_to", &self.alert_to)
            .finish()
    }
}

impl ServerConfig {
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

        let database_url = get_database_url("PAYFLOW_DATABASE_URL")?;
        let host = parse_env("PAYFLOW_HOST", "127.0.0.1")?;
        let port = parse_env("PAYFLOW_PORT", "8000")?;
        let notification_queue_capacity = parse_env(
            "PAYFLOW_NOTIFICATION_QUEUE_CAPACITY",
            &DEFAULT_NOTIFICATION_QUEUE_CAPACITY.to_string(),
        )?;

        Ok(Self {
            database_url,
            host,
            port,
            razorpay: RazorpayConfig::from_env()?,
            twilio: TwilioConfig::from_parts(
                get_optional_env("TWILIO_SID"),
                get_optional_env("TWILIO_AUTH_TOKEN").map(SecretString::from),
                get_optional_env("TWILIO_WHATSAPP_FROM"),
                get_optional_env("TWILIO_WHATSAPP_ALERT_TO"),
            )?,
            cors_origins: parse_list(get_optional_env("PAYFLOW_CORS_ORIGINS").as_deref()),
            trusted_user_header: get_optional_env("PAYFLOW_TRUSTED_USER_HEADER")
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty()),
            notification_queue_capacity,
            log_json: get_optional_env("PAYFLOW_LOG_JSON").is_some(),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl RazorpayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_base = get_env_or_default("RAZORPAY_API_BASE", DEFAULT_RAZORPAY_API_BASE);
        let api_base = Url::parse(&api_base).map_err(|e| {
            ConfigError::InvalidEnvVar("RAZORPAY_API_BASE".to_string(), e.to_string())
        })?;
        let timeout_secs: u64 = parse_env(
            "PAYFLOW_GATEWAY_TIMEOUT_SECS",
            &DEFAULT_GATEWAY_TIMEOUT_SECS.to_string(),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PAYFLOW_GATEWAY_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            key_id: get_required_env("RAZORPAY_KEY")?,
            key_secret: get_validated_secret("RAZORPAY_SECRET")?,
            api_base,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl TwilioConfig {
    /// Assemble the Twilio settings from their individual variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` when only some of the variables
    /// are set.
    pub fn from_parts(
        account_sid: Option<String>,
        auth_token: Option<SecretString>,
        whatsapp_from: Option<String>,
        alert_to: Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        match (account_sid, auth_token, whatsapp_from, alert_to) {
            (None, None, None, None) => Ok(None),
            (Some(account_sid), Some(auth_token), Some(whatsapp_from), Some(alert_to)) => {
                Ok(Some(Self {
                    account_sid,
                    auth_token,
                    whatsapp_from,
                    alert_to,
                }))
            }
            _ => Err(ConfigError::InvalidEnvVar(
                "TWILIO_*".to_string(),
                "set TWILIO_SID, TWILIO_AUTH_TOKEN, TWILIO_WHATSAPP_FROM and TWILIO_WHATSAPP_ALERT_TO together"
                    .to_string(),
            )),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
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

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the secret issued by the gateway dashboard."
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
