//! Payment gateway integration.
//!
//! This module provides:
//! - [`PaymentGateway`], the port the payment service depends on
//! - [`RazorpayClient`], the production implementation
//! - Checkout signature computation and verification
//!
//! # Flow
//!
//! 1. The server creates a remote order and hands its id and the public key
//!    id to the browser
//! 2. The browser completes checkout and receives a payment id and signature
//! 3. The server verifies the signature locally, then fetches the payment
//!    from the gateway as the authoritative record

mod error;
mod razorpay;
mod signature;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use payflow_core::{CurrencyCode, Metadata, MinorUnits, PaymentStatus, Receipt};

pub use error::{GatewayError, SignatureError};
pub use razorpay::RazorpayClient;
pub use signature::{compute_signature, verify_signature};

/// Parameters for a remote order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub receipt: Receipt,
    pub amount: MinorUnits,
    pub currency: CurrencyCode,
    /// Capture the payment automatically once authorized.
    pub auto_capture: bool,
}

/// An order as reported by the gateway.
///
/// Fields the service does not read are kept in `extra` so the full response
/// survives into metadata and API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A payment as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePayment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteOrder {
    /// The full gateway object as JSON.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl RemotePayment {
    /// Status reported by the gateway, if any.
    #[must_use]
    pub fn reported_status(&self) -> Option<PaymentStatus> {
        self.status.as_deref().map(PaymentStatus::from)
    }

    /// The full gateway object as a metadata bag.
    #[must_use]
    pub fn to_metadata(&self) -> Metadata {
        Metadata::from_value(serde_json::to_value(self).unwrap_or(Value::Null))
    }
}

/// Operations the payment service needs from a gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id the browser uses to open checkout.
    fn key_id(&self) -> &str;

    /// Create a remote order.
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<RemoteOrder, GatewayError>;

    /// Fetch the authoritative payment object.
    async fn fetch_payment(&self, payment_id: &str) -> Result<RemotePayment, GatewayError>;

    /// Check a checkout signature. Returns `Ok(())` only on an exact match.
    fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), SignatureError>;
}
