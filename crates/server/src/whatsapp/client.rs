//! Twilio Messages API client.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, error, instrument};

use super::error::WhatsAppError;
use crate::config::TwilioConfig;

/// Twilio REST API base URL.
const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Response to a successful message create.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Deserialize)]
struct TwilioErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Twilio client bound to one WhatsApp sender.
#[derive(Clone)]
pub struct WhatsAppClient {
    client: Client,
    account_sid: String,
    auth_token: SecretString,
    from: String,
}

impl std::fmt::Debug for WhatsAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppClient")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// Address a phone number on the WhatsApp channel.
#[must_use]
pub fn whatsapp_address(number: &str) -> String {
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{WHATSAPP_PREFIX}{number}")
    }
}

impl WhatsAppClient {
    /// Create a new Twilio client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &TwilioConfig) -> Result<Self, WhatsAppError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WhatsAppError::Config(e.to_string()))?;

        Ok(Self {
            client,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from: whatsapp_address(&config.whatsapp_from),
        })
    }

    /// Send a WhatsApp message.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Twilio rejects the message.
    #[instrument(skip(self, body))]
    pub async fn send(&self, to: &str, body: &str) -> Result<MessageResponse, WhatsAppError> {
        let to = whatsapp_address(to);
        let params = [("From", self.from.as_str()), ("To", to.as_str()), ("Body", body)];

        let response = self
            .client
            .post(format!(
                "{TWILIO_API_BASE}/Accounts/{}/Messages.json",
                self.account_sid
            ))
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&params)
            .send()
            .await
            .map_err(|e| WhatsAppError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TwilioErrorBody>(&text)
                .ok()
                .and_then(|b| match (b.code, b.message) {
                    (Some(code), Some(message)) => Some(format!("{message} (code {code})")),
                    (None, Some(message)) => Some(message),
                    _ => None,
                })
                .unwrap_or(text);

            error!(status = %status, message = %message, "Twilio API error sending message");
            return Err(WhatsAppError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let result: MessageResponse = response
            .json()
            .await
            .map_err(|e| WhatsAppError::Response(e.to_string()))?;

        debug!(sid = %result.sid, status = ?result.status, "WhatsApp message queued");

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whatsapp_address_adds_prefix_once() {
        assert_eq!(whatsapp_address("+919876543210"), "whatsapp:+919876543210");
        assert_eq!(
            whatsapp_address("whatsapp:+919876543210"),
            "whatsapp:+919876543210"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = WhatsAppClient::new(&TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: SecretString::from("super-secret-token".to_string()),
            whatsapp_from: "+14155238886".to_string(),
            alert_to: "+919876543210".to_string(),
        })
        .unwrap_or_else(|e| panic!("client: {e}"));

        let debug = format!("{client:?}");
        assert!(debug.contains("AC123"));
        assert!(debug.contains("whatsapp:+14155238886"));
        assert!(!debug.contains("super-secret-token"));
    }
}
