//! Razorpay REST API client.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};
use url::Url;

use super::error::{GatewayError, SignatureError};
use super::{CreateOrderRequest, PaymentGateway, RemoteOrder, RemotePayment, signature};
use crate::config::RazorpayConfig;

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    api_base: Url,
    key_id: String,
    key_secret: SecretString,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("api_base", &self.api_base.as_str())
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct OrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RazorpayClient {
    /// Create a new Razorpay client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &RazorpayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Config("API base cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Turn a non-success response into `GatewayError::Api`.
    async fn api_error(response: reqwest::Response) -> GatewayError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(ErrorEnvelope { error: detail }) => detail
                .description
                .or(detail.code)
                .unwrap_or_else(|| status.to_string()),
            Err(_) if body.is_empty() => status.to_string(),
            Err(_) => body,
        };

        error!(status = %status, message = %message, "Razorpay API error");

        GatewayError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    #[instrument(skip(self, request), fields(receipt = %request.receipt, amount = %request.amount))]
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<RemoteOrder, GatewayError> {
        let body = OrderBody {
            amount: request.amount.as_i64(),
            currency: request.currency.as_str(),
            receipt: request.receipt.as_str(),
            payment_capture: u8::from(request.auto_capture),
        };

        let response = self
            .client
            .post(self.endpoint(&["orders"])?)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let order: RemoteOrder = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        debug!(order_id = %order.id, "Razorpay order created");

        Ok(order)
    }

    #[instrument(skip(self))]
    async fn fetch_payment(&self, payment_id: &str) -> Result<RemotePayment, GatewayError> {
        let response = self
            .client
            .get(self.endpoint(&["payments", payment_id])?)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let payment: RemotePayment = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        debug!(status = ?payment.status, "Razorpay payment fetched");

        Ok(payment)
    }

    fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), SignatureError> {
        signature::verify_signature(&self.key_secret, order_id, payment_id, signature)
    }
}
