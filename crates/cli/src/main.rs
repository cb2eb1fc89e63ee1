//! Payflow CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run payment database migrations
//! payflow-cli migrate
//!
//! # Insert the sample payment order used in local development
//! payflow-cli seed
//!
//! # Print a stored payment order as JSON
//! payflow-cli order show 42
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Seed database with a sample payment order
//! - `order show` - Look up a payment order by id

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "payflow-cli")]
#[command(author, version, about = "Payflow CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database with a sample payment order
    Seed,
    /// Inspect payment orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Print a payment order as JSON
    Show {
        /// Local payment order id
        id: i64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed => commands::seed::sample_order().await?,
        Commands::Order { action } => match action {
            OrderAction::Show { id } => commands::order::show(id).await?,
        },
    }
    Ok(())
}
