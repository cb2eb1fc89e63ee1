//! Seed the database with a sample payment order.
//!
//! The sample mirrors what a fresh checkout looks like before verification,
//! so the verify endpoint and `order show` can be exercised locally without
//! calling the gateway.

use serde_json::json;
use tracing::info;

use payflow_core::{CurrencyCode, Metadata, MinorUnits, Receipt};
use payflow_server::db::{self, OrderStore, PgOrderStore, RepositoryError};
use payflow_server::models::NewPaymentOrder;

use super::database_url;

/// Receipt of the sample order.
pub const SAMPLE_RECEIPT: &str = "rcpt_test1234";

/// Gateway order id of the sample order.
pub const SAMPLE_REMOTE_ORDER_ID: &str = "order_test_ABC123";

/// Insert the sample payment order unless it already exists.
///
/// # Errors
///
/// Returns an error if the database URL is missing or the insert fails for a
/// reason other than the sample already being present.
pub async fn sample_order() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let store = PgOrderStore::new(pool);
    let result = store
        .create(NewPaymentOrder {
            user_id: None,
            receipt: Receipt::from_stored(SAMPLE_RECEIPT.to_string()),
            remote_order_id: SAMPLE_REMOTE_ORDER_ID.to_string(),
            amount_minor: MinorUnits::new(50_000),
            currency: CurrencyCode::INR,
            metadata: Metadata::new().with("test", json!("sample meta data")),
        })
        .await;

    match result {
        Ok(order) => {
            info!(id = %order.id, receipt = %order.receipt, "Sample payment order created");
            Ok(())
        }
        Err(RepositoryError::Conflict(_)) => {
            info!(receipt = SAMPLE_RECEIPT, "Sample payment order already present");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
