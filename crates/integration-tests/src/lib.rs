//! Integration tests for Payflow.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p payflow-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `payment_flow` - Order lifecycle through [`PaymentService`]
//! - `payment_routes` - HTTP surface through the full router
//!
//! Every test runs against [`InMemoryOrderStore`] and [`FakeGateway`], so no
//! database or network access is needed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Map, json};
use tokio::sync::Mutex;

use payflow_server::db::InMemoryOrderStore;
use payflow_server::gateway::{
    CreateOrderRequest, GatewayError, PaymentGateway, RemoteOrder, RemotePayment, SignatureError,
    compute_signature, verify_signature,
};
use payflow_server::services::{
    NotificationQueue, Notifier, NotifyError, OutboundEvent, PaymentService,
};
use payflow_server::state::AppState;

/// Key id handed to checkout by [`FakeGateway`].
pub const TEST_KEY_ID: &str = "rzp_test_key";

/// Signing secret used by [`FakeGateway`].
pub const TEST_KEY_SECRET: &str = "test_secret";

/// Header carrying the caller's user id in route tests.
pub const TEST_USER_HEADER: &str = "x-user-id";

/// Amount every fetched payment reports, in paise.
pub const TEST_PAYMENT_AMOUNT: i64 = 50_000;

// =============================================================================
// Fake Gateway
// =============================================================================

/// In-process gateway that signs with the real HMAC routine.
#[derive(Debug)]
pub struct FakeGateway {
    key_secret: SecretString,
    fail_create: bool,
    fail_fetch: bool,
    payment_status: Option<String>,
    orders_created: AtomicUsize,
    payments_fetched: AtomicUsize,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            key_secret: SecretString::from(TEST_KEY_SECRET),
            fail_create: false,
            fail_fetch: false,
            payment_status: Some("captured".to_string()),
            orders_created: AtomicUsize::new(0),
            payments_fetched: AtomicUsize::new(0),
        }
    }
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every order creation with an API error.
    #[must_use]
    pub const fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Time out on every payment fetch.
    #[must_use]
    pub const fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Status reported on fetched payments. `None` omits the field.
    #[must_use]
    pub fn with_payment_status(mut self, status: Option<&str>) -> Self {
        self.payment_status = status.map(str::to_string);
        self
    }

    /// Signature checkout would hand back for this order and payment.
    #[must_use]
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        compute_signature(&self.key_secret, order_id, payment_id).unwrap_or_default()
    }

    #[must_use]
    pub fn orders_created(&self) -> usize {
        self.orders_created.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn payments_fetched(&self) -> usize {
        self.payments_fetched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn key_id(&self) -> &str {
        TEST_KEY_ID
    }

    async fn create_order(&self, request: &CreateOrderRequest) -> Result<RemoteOrder, GatewayError> {
        if self.fail_create {
            return Err(GatewayError::Api {
                status: 400,
                message: "The amount must be atleast INR 1.00".to_string(),
            });
        }

        let n = self.orders_created.fetch_add(1, Ordering::SeqCst) + 1;
        let mut extra = Map::new();
        extra.insert("entity".to_string(), json!("order"));
        extra.insert("amount_paid".to_string(), json!(0));

        Ok(RemoteOrder {
            id: format!("order_test{n:04}"),
            amount: request.amount.as_i64(),
            currency: request.currency.as_str().to_string(),
            receipt: Some(request.receipt.as_str().to_string()),
            status: Some("created".to_string()),
            extra,
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<RemotePayment, GatewayError> {
        self.payments_fetched.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch {
            return Err(GatewayError::Timeout);
        }

        let mut extra = Map::new();
        extra.insert("entity".to_string(), json!("payment"));

        Ok(RemotePayment {
            id: payment_id.to_string(),
            status: self.payment_status.clone(),
            amount: Some(TEST_PAYMENT_AMOUNT),
            currency: Some("INR".to_string()),
            method: Some("upi".to_string()),
            order_id: None,
            extra,
        })
    }

    fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), SignatureError> {
        verify_signature(&self.key_secret, order_id, payment_id, signature)
    }
}

// =============================================================================
// Recording Notifier
// =============================================================================

/// Notifier that keeps every delivered event.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<OutboundEvent>>,
}

impl RecordingNotifier {
    /// Events delivered so far.
    pub async fn events(&self) -> Vec<OutboundEvent> {
        self.events.lock().await.clone()
    }

    /// Wait up to one second for at least `count` events.
    pub async fn wait_for(&self, count: usize) -> Vec<OutboundEvent> {
        for _ in 0..100 {
            let events = self.events().await;
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.events().await
    }

    /// Give the worker time to drain and return what arrived.
    pub async fn settle(&self) -> Vec<OutboundEvent> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.events().await
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, event: &OutboundEvent) -> Result<(), NotifyError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

// =============================================================================
// Test Context
// =============================================================================

/// A fully wired service over in-memory collaborators.
pub struct TestContext {
    pub store: Arc<InMemoryOrderStore>,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub state: AppState,
}

impl TestContext {
    /// Context with a default gateway reporting `captured` payments.
    #[must_use]
    pub fn new() -> Self {
        Self::with_gateway(FakeGateway::new())
    }

    /// Context around a customized gateway.
    ///
    /// Must be called inside a Tokio runtime; the notification worker is
    /// spawned here.
    #[must_use]
    pub fn with_gateway(gateway: FakeGateway) -> Self {
        let store = Arc::new(InMemoryOrderStore::new());
        let gateway = Arc::new(gateway);
        let notifier = Arc::new(RecordingNotifier::default());

        let (notifications, _worker) = NotificationQueue::spawn(notifier.clone(), 16);
        let payments = PaymentService::new(store.clone(), gateway.clone(), notifications);
        let state = AppState::new(payments, None, Some(TEST_USER_HEADER.to_string()));

        Self {
            store,
            gateway,
            notifier,
            state,
        }
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentService {
        self.state.payments()
    }

    /// Full router as served, without CORS origins.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        self.router_with_origins(&[])
    }

    /// Full router allowing browser requests from `origins`.
    #[must_use]
    pub fn router_with_origins(&self, origins: &[String]) -> axum::Router {
        payflow_server::app(self.state.clone(), origins)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
