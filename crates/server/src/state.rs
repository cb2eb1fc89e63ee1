//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::services::PaymentService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the payment service and, when running against `PostgreSQL`, the pool.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    payments: PaymentService,
    pool: Option<PgPool>,
    trusted_user_header: Option<String>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `payments` - Order lifecycle service
    /// * `pool` - `PostgreSQL` pool, checked by the readiness probe
    /// * `trusted_user_header` - Lowercase header carrying the user id
    #[must_use]
    pub fn new(
        payments: PaymentService,
        pool: Option<PgPool>,
        trusted_user_header: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                payments,
                pool,
                trusted_user_header,
            }),
        }
    }

    /// Get a reference to the payment service.
    #[must_use]
    pub fn payments(&self) -> &PaymentService {
        &self.inner.payments
    }

    /// Get a reference to the database connection pool, if any.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Header set by the upstream auth proxy, if configured.
    #[must_use]
    pub fn trusted_user_header(&self) -> Option<&str> {
        self.inner.trusted_user_header.as_deref()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("payments", &self.inner.payments)
            .field("has_pool", &self.inner.pool.is_some())
            .field("trusted_user_header", &self.inner.trusted_user_header)
            .finish()
    }
}
