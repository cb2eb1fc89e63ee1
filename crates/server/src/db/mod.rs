//! Payment order persistence.
//!
//! # Database: `payflow`
//!
//! ## Tables
//!
//! - `payment_orders` - One row per payment attempt (see `migrations/`)
//!
//! # Stores
//!
//! - [`PgOrderStore`] - `PostgreSQL` via sqlx, used by the server binary
//! - [`InMemoryOrderStore`] - Process-local store for tests and local runs
//!
//! Both enforce the same rule on [`OrderStore::save`]: the stored row is
//! re-read under a per-order lock and a save that would move a terminal
//! order, move a status backwards, or replace a recorded payment id is
//! rejected with [`RepositoryError::InvalidTransition`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p payflow-cli -- migrate
//! ```

pub mod memory;
pub mod payment_orders;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use payflow_core::PaymentOrderId;

use crate::models::{NewPaymentOrder, PaymentOrder, TransitionError};

pub use memory::InMemoryOrderStore;
pub use payment_orders::PgOrderStore;

/// Errors from order store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate receipt).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Save rejected because the stored order cannot make this transition.
    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),
}

/// Durable storage for payment orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order in status `created`, assigning id and timestamps.
    async fn create(&self, order: NewPaymentOrder) -> Result<PaymentOrder, RepositoryError>;

    /// Look up an order by its local id.
    async fn find_by_id(&self, id: PaymentOrderId)
    -> Result<Option<PaymentOrder>, RepositoryError>;

    /// Persist the mutable fields of `order` and return the stored row.
    async fn save(&self, order: &PaymentOrder) -> Result<PaymentOrder, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
