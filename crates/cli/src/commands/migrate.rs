//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! payflow-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `PAYFLOW_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Payment migrations live in `crates/server/migrations/` and are embedded
//! into the binary at compile time.

use tracing::info;

use payflow_server::db;

use super::{CommandError, database_url};

/// Run payment database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails,
/// or a migration fails to apply.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    info!("Connecting to payment database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running payment migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    info!("Payment migrations complete!");
    Ok(())
}
