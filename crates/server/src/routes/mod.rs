//! HTTP route handlers for the payment server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database ping)
//!
//! # Payments
//! POST /payments/create-order  - Create a remote order and local record
//! POST /payments/verify        - Verify a checkout callback
//! GET  /payments/{id}          - Look up a local payment order
//!
//! # Same payment routes under the API prefix used by the checkout SPA
//! /api/payments/*
//! ```

pub mod health;
pub mod payments;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(payments::create_order))
        .route("/verify", post(payments::verify))
        .route("/{id}", get(payments::show))
}

/// Create all routes for the payment server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/payments", payment_routes())
        .nest("/api/payments", payment_routes())
}
