//! Payment order domain type.
//!
//! One `PaymentOrder` exists per payment attempt. Identity, receipt, gateway
//! order id, amount and currency are fixed at creation; only the gateway
//! payment id, status and metadata change, and only through
//! [`PaymentOrder::record_verification`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use payflow_core::{
    CurrencyCode, Metadata, MinorUnits, Money, PaymentOrderId, PaymentStatus, Receipt, UserId,
};

/// Rejected mutation of a payment order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The status may not move from `from` to `to`.
    #[error("cannot move payment order from {from} to {to}")]
    IllegalStatus {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// A different gateway payment is already recorded on the order.
    #[error("payment order already settled by payment {existing}")]
    PaymentIdAlreadySet { existing: String },
}

/// A locally tracked payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentOrder {
    pub id: PaymentOrderId,
    pub user_id: Option<UserId>,
    pub receipt: Receipt,
    pub remote_order_id: String,
    pub remote_payment_id: Option<String>,
    pub amount_minor: MinorUnits,
    pub currency: CurrencyCode,
    pub status: PaymentStatus,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when persisting a new order.
#[derive(Debug, Clone)]
pub struct NewPaymentOrder {
    pub user_id: Option<UserId>,
    pub receipt: Receipt,
    pub remote_order_id: String,
    pub amount_minor: MinorUnits,
    pub currency: CurrencyCode,
    pub metadata: Metadata,
}

impl PaymentOrder {
    /// Amount and currency of the order.
    #[must_use]
    pub const fn money(&self) -> Money {
        Money::new(self.amount_minor, self.currency)
    }

    /// Check that this order may move to `status` with `remote_payment_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the order is terminal, the status would
    /// move backwards, or another payment id (or none) would replace the
    /// recorded one.
    pub fn check_transition(
        &self,
        remote_payment_id: Option<&str>,
        status: &PaymentStatus,
    ) -> Result<(), TransitionError> {
        if let Some(existing) = &self.remote_payment_id
            && Some(existing.as_str()) != remote_payment_id
        {
            return Err(TransitionError::PaymentIdAlreadySet {
                existing: existing.clone(),
            });
        }

        if !self.status.can_transition_to(status) {
            return Err(TransitionError::IllegalStatus {
                from: self.status.clone(),
                to: status.clone(),
            });
        }

        Ok(())
    }

    /// Apply the outcome of a verified gateway payment.
    ///
    /// Sets the payment id, moves the status and replaces the metadata with
    /// the fetched payment object. Leaves the order untouched on error.
    ///
    /// # Errors
    ///
    /// See [`PaymentOrder::check_transition`].
    pub fn record_verification(
        &mut self,
        remote_payment_id: &str,
        status: PaymentStatus,
        payment: Metadata,
    ) -> Result<(), TransitionError> {
        self.check_transition(Some(remote_payment_id), &status)?;

        self.remote_payment_id = Some(remote_payment_id.to_string());
        self.status = status;
        self.metadata = payment;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn order() -> PaymentOrder {
        let now = Utc::now();
        PaymentOrder {
            id: PaymentOrderId::new(1),
            user_id: None,
            receipt: Receipt::from_stored("rcpt_abcdefgh123456".to_string()),
            remote_order_id: "order_ABC".to_string(),
            remote_payment_id: None,
            amount_minor: MinorUnits::new(50_000),
            currency: CurrencyCode::INR,
            status: PaymentStatus::Created,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_record_capture() {
        let mut order = order();
        let payment = Metadata::from_value(json!({"id": "pay_1", "status": "captured"}));
        order
            .record_verification("pay_1", PaymentStatus::Captured, payment.clone())
            .unwrap();

        assert_eq!(order.status, PaymentStatus::Captured);
        assert_eq!(order.remote_payment_id.as_deref(), Some("pay_1"));
        assert_eq!(order.metadata, payment);
        // Immutable fields untouched
        assert_eq!(order.remote_order_id, "order_ABC");
        assert_eq!(order.amount_minor, MinorUnits::new(50_000));
    }

    #[test]
    fn test_terminal_order_is_left_untouched() {
        let mut order = order();
        order
            .record_verification("pay_1", PaymentStatus::Failed, Metadata::new())
            .unwrap();
        let before = order.clone();

        let err = order
            .record_verification("pay_1", PaymentStatus::Captured, Metadata::new())
            .unwrap_err();
        assert!(matches!(err, TransitionError::IllegalStatus { .. }));
        assert_eq!(order, before);
    }

    #[test]
    fn test_payment_id_set_at_most_once() {
        let mut order = order();
        order
            .record_verification("pay_1", PaymentStatus::Authorized, Metadata::new())
            .unwrap();

        let err = order
            .record_verification("pay_2", PaymentStatus::Captured, Metadata::new())
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::PaymentIdAlreadySet {
                existing: "pay_1".to_string()
            }
        );

        // Same payment may still advance from authorized to captured
        order
            .record_verification("pay_1", PaymentStatus::Captured, Metadata::new())
            .unwrap();
        assert_eq!(order.status, PaymentStatus::Captured);
    }

    #[test]
    fn test_money() {
        assert_eq!(order().money().to_string(), "₹500.00");
    }
}
