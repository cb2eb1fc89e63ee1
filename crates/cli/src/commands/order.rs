//! Payment order lookup.

use tracing::{info, warn};

use payflow_core::PaymentOrderId;
use payflow_server::db::{self, OrderStore, PgOrderStore};

use super::database_url;

/// Print a stored payment order as pretty JSON.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the stored row is
/// corrupted.
pub async fn show(id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;
    let store = PgOrderStore::new(pool);

    match store.find_by_id(PaymentOrderId::new(id)).await? {
        Some(order) => {
            info!("Payment order {id}:\n{}", serde_json::to_string_pretty(&order)?);
        }
        None => warn!("No payment order with id {id}"),
    }

    Ok(())
}
