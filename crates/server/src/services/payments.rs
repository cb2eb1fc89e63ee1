//! Payment order lifecycle.
//!
//! [`PaymentService`] owns the two operations that move money state:
//!
//! 1. [`PaymentService::create_order`] converts the requested amount to
//!    paise, creates the remote order and records a local order in
//!    `created`. Nothing is stored when the gateway call fails.
//! 2. [`PaymentService::verify_payment`] checks the checkout signature,
//!    fetches the authoritative payment from the gateway and, when the
//!    caller names a local order, records the outcome on it. The signature
//!    check runs before any read or write, so a forged callback leaves every
//!    order untouched.
//!
//! Local bookkeeping during verification is best-effort: a missing or
//! mismatched local order, or one the store refuses to move, is logged and
//! the payment is still reported as verified.

use std::net::IpAddr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use payflow_core::{
    AmountError, CurrencyCode, Metadata, MinorUnits, PaymentOrderId, PaymentStatus, Receipt,
    UserId,
};

use super::notifications::{NotificationQueue, OutboundEvent};
use super::validation::ValidationErrors;
use crate::db::{OrderStore, RepositoryError};
use crate::gateway::{
    CreateOrderRequest, GatewayError, PaymentGateway, RemoteOrder, RemotePayment, SignatureError,
};
use crate::models::{NewPaymentOrder, PaymentOrder};

/// Smallest order accepted, in rupees.
pub const MIN_ORDER_AMOUNT: Decimal = Decimal::ONE;

/// Errors from payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Checkout signature does not match.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Gateway call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Required local order does not exist.
    #[error("payment order {0} not found")]
    NotFound(PaymentOrderId),

    /// Order store failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<ValidationErrors> for PaymentError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Checkout preferences passed through to metadata.
#[derive(Debug, Clone, Default)]
pub struct CheckoutOptions {
    pub upi_option: Option<Value>,
    pub card_option: Option<Value>,
}

/// Input for [`PaymentService::create_order`].
#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    /// Amount in rupees.
    pub amount: Decimal,
    pub user_id: Option<UserId>,
    pub options: CheckoutOptions,
}

/// Result of a successful order creation.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    /// Remote order as returned by the gateway.
    pub order: RemoteOrder,
    /// Local order id.
    pub payment_db_id: PaymentOrderId,
    /// Public key id for opening checkout.
    pub key: String,
}

/// Input for [`PaymentService::verify_payment`].
#[derive(Debug, Clone)]
pub struct VerifyInput {
    pub remote_order_id: String,
    pub remote_payment_id: String,
    pub signature: String,
    pub local_order_id: Option<PaymentOrderId>,
}

/// Caller details recorded when a verification is rejected.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub client_ip: Option<IpAddr>,
    pub request_id: Option<String>,
}

/// Result of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    /// Payment as fetched from the gateway.
    pub payment: RemotePayment,
    /// The local order, when this call recorded the payment on it.
    pub order: Option<PaymentOrder>,
}

enum Bookkeeping {
    Recorded(PaymentOrder),
    Skipped,
    AlreadySettled,
}

/// Order lifecycle controller.
pub struct PaymentService {
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifications: NotificationQueue,
}

impl std::fmt::Debug for PaymentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentService")
            .field("key_id", &self.gateway.key_id())
            .finish_non_exhaustive()
    }
}

/// Validate a rupee amount and convert it to paise.
///
/// # Errors
///
/// Returns `PaymentError::Validation` on the `amount` field when the amount
/// is below [`MIN_ORDER_AMOUNT`] or too large to represent.
pub fn amount_to_minor(amount: Decimal) -> Result<MinorUnits, PaymentError> {
    if amount < MIN_ORDER_AMOUNT {
        return Err(ValidationErrors::single(
            "amount",
            format!("The amount must be at least {MIN_ORDER_AMOUNT}."),
        )
        .into());
    }

    MinorUnits::from_major(amount).map_err(|e| {
        let message = match e {
            AmountError::OutOfRange => "The amount is too large.".to_string(),
            other => format!("The amount is invalid: {other}."),
        };
        ValidationErrors::single("amount", message).into()
    })
}

impl PaymentService {
    #[must_use]
    pub fn new(
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            store,
            gateway,
            notifications,
        }
    }

    /// Public key id for opening checkout.
    #[must_use]
    pub fn key_id(&self) -> &str {
        self.gateway.key_id()
    }

    /// Create a remote order and record it locally.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Validation` for an invalid amount,
    /// `PaymentError::Gateway` if the remote order cannot be created (nothing
    /// is stored), and `PaymentError::Repository` if the local record cannot
    /// be written.
    #[instrument(skip(self, input), fields(amount = %input.amount, user_id = ?input.user_id))]
    pub async fn create_order(&self, input: CreateOrderInput) -> Result<CreatedOrder, PaymentError> {
        let amount = amount_to_minor(input.amount)?;
        let receipt = Receipt::generate();

        let remote = self
            .gateway
            .create_order(&CreateOrderRequest {
                receipt: receipt.clone(),
                amount,
                currency: CurrencyCode::INR,
                auto_capture: true,
            })
            .await
            .inspect_err(|e| error!(receipt = %receipt, error = %e, "Gateway rejected order"))?;

        let metadata = Metadata::new()
            .with("order", remote.to_value())
            .with("upi_option", input.options.upi_option.unwrap_or(Value::Null))
            .with("card_option", input.options.card_option.unwrap_or(Value::Null));

        let order = self
            .store
            .create(NewPaymentOrder {
                user_id: input.user_id,
                receipt,
                remote_order_id: remote.id.clone(),
                amount_minor: amount,
                currency: CurrencyCode::INR,
                metadata,
            })
            .await
            .inspect_err(|e| {
                error!(
                    remote_order_id = %remote.id,
                    error = %e,
                    "Remote order created but local record failed"
                );
            })?;

        info!(
            order_id = %order.id,
            remote_order_id = %remote.id,
            receipt = %order.receipt,
            amount = %order.money(),
            "Payment order created"
        );

        Ok(CreatedOrder {
            order: remote,
            payment_db_id: order.id,
            key: self.gateway.key_id().to_string(),
        })
    }

    /// Verify a checkout callback and record the payment.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` if the signature does not
    /// match (no state is read or written), `PaymentError::Gateway` if the
    /// payment cannot be fetched, and `PaymentError::Repository` if the
    /// store fails for reasons other than a rejected transition.
    #[instrument(
        skip(self, input, caller),
        fields(
            remote_order_id = %input.remote_order_id,
            remote_payment_id = %input.remote_payment_id,
            local_order_id = ?input.local_order_id,
        )
    )]
    pub async fn verify_payment(
        &self,
        input: VerifyInput,
        caller: &CallerContext,
    ) -> Result<VerifiedPayment, PaymentError> {
        if let Err(e) = self.gateway.verify_signature(
            &input.remote_order_id,
            &input.remote_payment_id,
            &input.signature,
        ) {
            match &e {
                SignatureError::Mismatch => warn!(
                    client_ip = ?caller.client_ip,
                    request_id = ?caller.request_id,
                    remote_order_id = %input.remote_order_id,
                    local_order_id = ?input.local_order_id,
                    "Payment signature verification failed"
                ),
                SignatureError::InvalidKey(_) => {
                    error!(error = %e, "Signature key unusable");
                }
            }
            return Err(PaymentError::InvalidSignature);
        }

        let payment = self.gateway.fetch_payment(&input.remote_payment_id).await?;

        let bookkeeping = match input.local_order_id {
            Some(id) => self.record_payment(id, &input, &payment).await?,
            None => Bookkeeping::Skipped,
        };

        let order = match bookkeeping {
            Bookkeeping::Recorded(order) => Some(order),
            Bookkeeping::Skipped => None,
            Bookkeeping::AlreadySettled => {
                return Ok(VerifiedPayment {
                    payment,
                    order: None,
                });
            }
        };

        self.notifications.enqueue(OutboundEvent::PaymentVerified {
            order_id: order.as_ref().map(|o| o.id),
            remote_order_id: input.remote_order_id.clone(),
            remote_payment_id: payment.id.clone(),
            status: payment.reported_status().unwrap_or(PaymentStatus::Captured),
            amount: payment.amount.map(MinorUnits::new),
        });

        info!(status = ?payment.status, recorded = order.is_some(), "Payment verified");

        Ok(VerifiedPayment { payment, order })
    }

    /// Look up a local order that must exist.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotFound` if there is no such order.
    pub async fn find_order(&self, id: PaymentOrderId) -> Result<PaymentOrder, PaymentError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(PaymentError::NotFound(id))
    }

    async fn record_payment(
        &self,
        id: PaymentOrderId,
        input: &VerifyInput,
        payment: &RemotePayment,
    ) -> Result<Bookkeeping, PaymentError> {
        let Some(mut order) = self.store.find_by_id(id).await? else {
            warn!(order_id = %id, "Verified payment for unknown local order");
            return Ok(Bookkeeping::Skipped);
        };

        if order.remote_order_id != input.remote_order_id {
            warn!(
                order_id = %id,
                stored_remote_order_id = %order.remote_order_id,
                "Local order belongs to a different gateway order, not recording payment"
            );
            return Ok(Bookkeeping::Skipped);
        }

        let status = payment.reported_status().unwrap_or_else(|| {
            warn!(order_id = %id, "Gateway omitted payment status, recording as captured");
            PaymentStatus::Captured
        });

        if let Err(e) =
            order.record_verification(&input.remote_payment_id, status, payment.to_metadata())
        {
            info!(order_id = %id, reason = %e, "Payment order already settled");
            return Ok(Bookkeeping::AlreadySettled);
        }

        match self.store.save(&order).await {
            Ok(saved) => {
                info!(order_id = %id, status = %saved.status, "Payment recorded on order");
                Ok(Bookkeeping::Recorded(saved))
            }
            Err(RepositoryError::InvalidTransition(e)) => {
                info!(order_id = %id, reason = %e, "Concurrent verification settled order first");
                Ok(Bookkeeping::AlreadySettled)
            }
            Err(e) => Err(e.into()),
        }
    }
}
