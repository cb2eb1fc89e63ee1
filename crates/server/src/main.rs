//! Payflow payment server.
//!
//! Serves the payment order API on port 8000 by default.
//!
//! # Architecture
//!
//! - Axum web framework, JSON in and out
//! - Razorpay REST API for remote orders and payments
//! - `PostgreSQL` for local payment order records
//! - Background worker for WhatsApp payment alerts (Twilio)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use payflow_server::config::ServerConfig;
use payflow_server::db::{self, PgOrderStore};
use payflow_server::gateway::RazorpayClient;
use payflow_server::services::{LogNotifier, NotificationQueue, Notifier, PaymentService};
use payflow_server::state::AppState;
use payflow_server::whatsapp::{WhatsAppClient, WhatsAppNotifier};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for queued notifications after the server stops.
const NOTIFICATION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Initialize tracing with `EnvFilter`, text or JSON output, and Sentry.
fn init_tracing(log_json: bool) {
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "payflow_server=info,tower_http=debug".into());

    let json_layer = log_json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!log_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

/// Pick the notifier for outbound payment events.
fn build_notifier(config: &ServerConfig) -> Result<Arc<dyn Notifier>, Box<dyn Error>> {
    match &config.twilio {
        Some(twilio) => {
            let client = WhatsAppClient::new(twilio)?;
            tracing::info!(recipient = %twilio.alert_to, "WhatsApp payment alerts enabled");
            Ok(Arc::new(WhatsAppNotifier::new(client, twilio.alert_to.clone())))
        }
        None => {
            tracing::info!("Twilio not configured, payment alerts go to the log");
            Ok(Arc::new(LogNotifier))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load configuration from environment (needed for Sentry init)
    let config = ServerConfig::from_env()?;

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing(config.log_json);

    // Initialize database connection pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p payflow-cli -- migrate

    let gateway = RazorpayClient::new(&config.razorpay)?;
    tracing::info!(?gateway, "Razorpay client created");

    let (notifications, notification_worker) =
        NotificationQueue::spawn(build_notifier(&config)?, config.notification_queue_capacity);

    let payments = PaymentService::new(
        Arc::new(PgOrderStore::new(pool.clone())),
        Arc::new(gateway),
        notifications,
    );
    let state = AppState::new(
        payments,
        Some(pool),
        config.trusted_user_header.clone(),
    );

    let app = payflow_server::app(state, &config.cors_origins);

    // Start server
    let addr = config.socket_addr();
    tracing::info!("payflow-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The router (and every queue handle) is gone; let the worker drain
    if tokio::time::timeout(NOTIFICATION_DRAIN_TIMEOUT, notification_worker)
        .await
        .is_err()
    {
        tracing::warn!("Timed out waiting for pending notifications");
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
