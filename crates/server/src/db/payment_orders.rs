//! `PostgreSQL` order store.
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate builds
//! without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use payflow_core::{
    CurrencyCode, Metadata, MinorUnits, PaymentOrderId, PaymentStatus, Receipt, UserId,
};

use super::{OrderStore, RepositoryError};
use crate::models::{NewPaymentOrder, PaymentOrder};

const COLUMNS: &str = "id, user_id, receipt, remote_order_id, remote_payment_id, \
                       amount_minor, currency, status, metadata, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct PaymentOrderRow {
    id: i64,
    user_id: Option<i64>,
    receipt: String,
    remote_order_id: String,
    remote_payment_id: Option<String>,
    amount_minor: i64,
    currency: String,
    status: String,
    metadata: Json<Metadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentOrderRow> for PaymentOrder {
    type Error = RepositoryError;

    fn try_from(row: PaymentOrderRow) -> Result<Self, Self::Error> {
        let currency: CurrencyCode = row.currency.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid currency in database: {e}"))
        })?;

        if row.amount_minor <= 0 {
            return Err(RepositoryError::DataCorruption(format!(
                "non-positive amount in database for order {}",
                row.id
            )));
        }

        Ok(Self {
            id: PaymentOrderId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            receipt: Receipt::from_stored(row.receipt),
            remote_order_id: row.remote_order_id,
            remote_payment_id: row.remote_payment_id,
            amount_minor: MinorUnits::new(row.amount_minor),
            currency,
            status: PaymentStatus::from(row.status),
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Order store backed by the `payment_orders` table.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the receipt already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    async fn create(&self, order: NewPaymentOrder) -> Result<PaymentOrder, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentOrderRow>(&format!(
            r"
            INSERT INTO payment_orders (
                user_id, receipt, remote_order_id, amount_minor, currency, status, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "
        ))
        .bind(order.user_id.map(|id| id.as_i64()))
        .bind(order.receipt.as_str())
        .bind(&order.remote_order_id)
        .bind(order.amount_minor.as_i64())
        .bind(order.currency.as_str())
        .bind(PaymentStatus::Created.as_str())
        .bind(Json(&order.metadata))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("receipt already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }

    async fn find_by_id(
        &self,
        id: PaymentOrderId,
    ) -> Result<Option<PaymentOrder>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentOrderRow>(&format!(
            "SELECT {COLUMNS} FROM payment_orders WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentOrder::try_from).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::InvalidTransition` if the stored order
    /// cannot move to the new payment id and status.
    async fn save(&self, order: &PaymentOrder) -> Result<PaymentOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent verifications of the same order
        let current = sqlx::query_as::<_, PaymentOrderRow>(&format!(
            "SELECT {COLUMNS} FROM payment_orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order.id.as_i64())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        let current = PaymentOrder::try_from(current)?;

        current.check_transition(order.remote_payment_id.as_deref(), &order.status)?;

        let row = sqlx::query_as::<_, PaymentOrderRow>(&format!(
            r"
            UPDATE payment_orders
            SET remote_payment_id = $2, status = $3, metadata = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "
        ))
        .bind(order.id.as_i64())
        .bind(order.remote_payment_id.as_deref())
        .bind(order.status.as_str())
        .bind(Json(&order.metadata))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        row.try_into()
    }
}
