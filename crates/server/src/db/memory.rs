//! Process-local order store.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use payflow_core::{PaymentOrderId, PaymentStatus};

use super::{OrderStore, RepositoryError};
use crate::models::{NewPaymentOrder, PaymentOrder};

#[derive(Debug, Default)]
struct Inner {
    orders: HashMap<PaymentOrderId, PaymentOrder>,
    receipts: HashSet<String>,
    next_id: i64,
}

/// Order store held in memory.
///
/// Saves take the write lock for the whole check-and-write, which gives the
/// same per-order serialization as the row lock in [`super::PgOrderStore`].
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: RwLock<Inner>,
}

impl InMemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: NewPaymentOrder) -> Result<PaymentOrder, RepositoryError> {
        let mut inner = self.inner.write().await;

        if !inner.receipts.insert(order.receipt.as_str().to_owned()) {
            return Err(RepositoryError::Conflict(
                "receipt already exists".to_owned(),
            ));
        }

        inner.next_id += 1;
        let now = Utc::now();
        let stored = PaymentOrder {
            id: PaymentOrderId::new(inner.next_id),
            user_id: order.user_id,
            receipt: order.receipt,
            remote_order_id: order.remote_order_id,
            remote_payment_id: None,
            amount_minor: order.amount_minor,
            currency: order.currency,
            status: PaymentStatus::Created,
            metadata: order.metadata,
            created_at: now,
            updated_at: now,
        };
        inner.orders.insert(stored.id, stored.clone());

        Ok(stored)
    }

    async fn find_by_id(
        &self,
        id: PaymentOrderId,
    ) -> Result<Option<PaymentOrder>, RepositoryError> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn save(&self, order: &PaymentOrder) -> Result<PaymentOrder, RepositoryError> {
        let mut inner = self.inner.write().await;
        let current = inner
            .orders
            .get_mut(&order.id)
            .ok_or(RepositoryError::NotFound)?;

        current.check_transition(order.remote_payment_id.as_deref(), &order.status)?;

        current.remote_payment_id.clone_from(&order.remote_payment_id);
        current.status = order.status.clone();
        current.metadata = order.metadata.clone();
        current.updated_at = Utc::now();

        Ok(current.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use payflow_core::{CurrencyCode, Metadata, MinorUnits, Receipt};
    use serde_json::json;

    use super::*;
    use crate::models::TransitionError;

    fn new_order(receipt: &str) -> NewPaymentOrder {
        NewPaymentOrder {
            user_id: None,
            receipt: Receipt::from_stored(receipt.to_string()),
            remote_order_id: "order_ABC".to_string(),
            amount_minor: MinorUnits::new(50_000),
            currency: CurrencyCode::INR,
            metadata: Metadata::new().with("upi_option", json!("phonepe")),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_created_status() {
        let store = InMemoryOrderStore::new();
        let first = store.create(new_order("rcpt_a")).await.unwrap();
        let second = store.create(new_order("rcpt_b")).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.status, PaymentStatus::Created);
        assert!(first.remote_payment_id.is_none());
        assert_eq!(store.len().await, 2);

        let found = store.find_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(found, first);
    }

    #[tokio::test]
    async fn test_duplicate_receipt_conflicts() {
        let store = InMemoryOrderStore::new();
        store.create(new_order("rcpt_a")).await.unwrap();

        let err = store.create(new_order("rcpt_a")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_missing_returns_none() {
        let store = InMemoryOrderStore::new();
        assert!(
            store
                .find_by_id(PaymentOrderId::new(42))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_save_applies_verification() {
        let store = InMemoryOrderStore::new();
        let mut order = store.create(new_order("rcpt_a")).await.unwrap();

        order
            .record_verification("pay_1", PaymentStatus::Captured, Metadata::new())
            .unwrap();
        let saved = store.save(&order).await.unwrap();

        assert_eq!(saved.status, PaymentStatus::Captured);
        assert_eq!(saved.remote_payment_id.as_deref(), Some("pay_1"));
        assert!(saved.updated_at >= saved.created_at);
    }

    #[tokio::test]
    async fn test_save_missing_order_is_not_found() {
        let store = InMemoryOrderStore::new();
        let mut order = store.create(new_order("rcpt_a")).await.unwrap();
        order.id = PaymentOrderId::new(999);

        let err = store.save(&order).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_save_rejects_stale_copy() {
        let store = InMemoryOrderStore::new();
        let order = store.create(new_order("rcpt_a")).await.unwrap();

        // Two readers take the same snapshot
        let mut first = order.clone();
        let mut second = order;
        first
            .record_verification("pay_1", PaymentStatus::Captured, Metadata::new())
            .unwrap();
        second
            .record_verification("pay_1", PaymentStatus::Failed, Metadata::new())
            .unwrap();

        store.save(&first).await.unwrap();
        let err = store.save(&second).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::InvalidTransition(TransitionError::IllegalStatus { .. })
        ));

        let stored = store.find_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Captured);
    }

    #[tokio::test]
    async fn test_concurrent_saves_settle_once() {
        let store = Arc::new(InMemoryOrderStore::new());
        let order = store.create(new_order("rcpt_a")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let mut copy = order.clone();
            handles.push(tokio::spawn(async move {
                copy.record_verification(
                    &format!("pay_{i}"),
                    PaymentStatus::Captured,
                    Metadata::new(),
                )
                .unwrap();
                store.save(&copy).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
