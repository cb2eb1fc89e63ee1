//! Payment gateway errors.

use thiserror::Error;

/// Errors from calls to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed before a response arrived.
    #[error("gateway request failed: {0}")]
    Request(String),

    /// The gateway did not answer within the configured timeout.
    #[error("gateway request timed out")]
    Timeout,

    /// Gateway returned an error response.
    #[error("gateway API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("gateway response error: {0}")]
    Parse(String),

    /// Client could not be constructed.
    #[error("gateway configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Signature verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Computed and supplied signatures differ.
    #[error("signature mismatch")]
    Mismatch,

    /// Key could not be used for HMAC.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}
