//! WhatsApp-related errors.

use thiserror::Error;

/// Errors that can occur when sending through Twilio.
#[derive(Debug, Error)]
pub enum WhatsAppError {
    /// HTTP request failed.
    #[error("Twilio request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("Twilio response error: {0}")]
    Response(String),

    /// Twilio returned an error.
    #[error("Twilio API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Configuration error.
    #[error("Twilio configuration error: {0}")]
    Config(String),
}
