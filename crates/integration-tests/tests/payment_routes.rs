//! Integration tests for the payment HTTP surface.
//!
//! Requests go through the full router (request id, tracing, CORS and
//! Sentry layers) with `tower::ServiceExt::oneshot`, so status codes and
//! JSON bodies are checked exactly as a browser would see them.

#![allow(clippy::unwrap_used)]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use payflow_core::{PaymentOrderId, PaymentStatus, UserId};
use payflow_integration_tests::{FakeGateway, TEST_KEY_ID, TEST_USER_HEADER, TestContext};
use payflow_server::db::OrderStore;

async fn send(ctx: &TestContext, request: Request<Body>) -> (StatusCode, Value) {
    let response = ctx.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

/// Create an order through the API and return `(remote order id, local id)`.
async fn create_order(ctx: &TestContext) -> (String, i64) {
    let (status, body) = send(
        ctx,
        post_json("/payments/create-order", &json!({"amount": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (
        body["order"]["id"].as_str().unwrap().to_string(),
        body["payment_db_id"].as_i64().unwrap(),
    )
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new();

    let response = ctx.router().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");

    // No database configured, nothing to check
    let response = ctx.router().oneshot(get("/health/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let ctx = TestContext::new();

    let response = ctx.router().oneshot(get("/health")).await.unwrap();
    let generated = response.headers().get("x-request-id").unwrap();
    assert!(!generated.is_empty());

    let request = Request::get("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = ctx.router().oneshot(request).await.unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-123");
}

#[tokio::test]
async fn test_preflight_allows_bearer_token() {
    let ctx = TestContext::new();
    let origin = "http://localhost:5173";

    for uri in ["/api/payments/create-order", "/api/payments/verify"] {
        let request = Request::options(uri)
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(
                header::ACCESS_CONTROL_REQUEST_HEADERS,
                "authorization,content-type",
            )
            .body(Body::empty())
            .unwrap();
        let response = ctx
            .router_with_origins(&[origin.to_string()])
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            origin
        );
        let allowed = headers
            .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(
            allowed.split(',').any(|h| h.trim() == "authorization"),
            "allowed headers: {allowed}"
        );
    }
}

// =============================================================================
// POST /payments/create-order
// =============================================================================

#[tokio::test]
async fn test_create_order_success() {
    let ctx = TestContext::new();

    let (status, body) = send(
        &ctx,
        post_json(
            "/payments/create-order",
            &json!({"amount": "500", "upi_option": {"flow": "collect"}}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["key"], json!(TEST_KEY_ID));
    assert_eq!(body["order"]["amount"], json!(50_000));
    assert_eq!(body["order"]["currency"], json!("INR"));
    assert_eq!(body["order"]["entity"], json!("order"));

    let id = PaymentOrderId::new(body["payment_db_id"].as_i64().unwrap());
    let order = ctx.store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(order.remote_order_id, body["order"]["id"].as_str().unwrap());
    assert!(order.user_id.is_none());
}

#[tokio::test]
async fn test_create_order_records_trusted_user() {
    let ctx = TestContext::new();

    let request = Request::post("/payments/create-order")
        .header(header::CONTENT_TYPE, "application/json")
        .header(TEST_USER_HEADER, "42")
        .body(Body::from(json!({"amount": 10}).to_string()))
        .unwrap();
    let (status, body) = send(&ctx, request).await;
    assert_eq!(status, StatusCode::OK);

    let id = PaymentOrderId::new(body["payment_db_id"].as_i64().unwrap());
    let order = ctx.store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(order.user_id, Some(UserId::new(42)));
}

#[tokio::test]
async fn test_create_order_ignores_malformed_user_header() {
    let ctx = TestContext::new();

    let request = Request::post("/payments/create-order")
        .header(header::CONTENT_TYPE, "application/json")
        .header(TEST_USER_HEADER, "not-a-number")
        .body(Body::from(json!({"amount": 10}).to_string()))
        .unwrap();
    let (status, body) = send(&ctx, request).await;
    assert_eq!(status, StatusCode::OK);

    let id = PaymentOrderId::new(body["payment_db_id"].as_i64().unwrap());
    assert!(ctx.store.find_by_id(id).await.unwrap().unwrap().user_id.is_none());
}

#[tokio::test]
async fn test_create_order_validation_errors() {
    let ctx = TestContext::new();

    let cases = [
        (json!({}), "The amount field is required."),
        (json!({"amount": null}), "The amount field is required."),
        (json!({"amount": "abc"}), "The amount must be a number."),
        (json!({"amount": "1_000"}), "The amount must be a number."),
        (json!({"amount": true}), "The amount must be a number."),
        (json!({"amount": 0.5}), "The amount must be at least 1."),
        (json!({"amount": -10}), "The amount must be at least 1."),
    ];

    for (payload, message) in cases {
        let (status, body) = send(&ctx, post_json("/payments/create-order", &payload)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "payload {payload}");
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!(message), "payload {payload}");
        assert_eq!(body["errors"]["amount"], json!([message]));
    }

    assert_eq!(ctx.gateway.orders_created(), 0);
    assert!(ctx.store.is_empty().await);
}

#[tokio::test]
async fn test_create_order_malformed_body() {
    let ctx = TestContext::new();

    let request = Request::post("/payments/create-order")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&ctx, request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["body"].is_array());
}

#[tokio::test]
async fn test_create_order_gateway_failure() {
    let ctx = TestContext::with_gateway(FakeGateway::new().failing_create());

    let (status, body) = send(
        &ctx,
        post_json("/payments/create-order", &json!({"amount": 500})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("The amount must be atleast INR 1.00")
    );
    assert!(ctx.store.is_empty().await);
}

// =============================================================================
// POST /payments/verify
// =============================================================================

#[tokio::test]
async fn test_verify_success() {
    let ctx = TestContext::new();
    let (remote_order_id, local_id) = create_order(&ctx).await;

    let (status, body) = send(
        &ctx,
        post_json(
            "/payments/verify",
            &json!({
                "razorpay_order_id": remote_order_id,
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": ctx.gateway.sign(&remote_order_id, "pay_1"),
                "payment_db_id": local_id,
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["payment"]["id"], json!("pay_1"));
    assert_eq!(body["payment"]["status"], json!("captured"));

    let order = ctx
        .store
        .find_by_id(PaymentOrderId::new(local_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, PaymentStatus::Captured);
    assert_eq!(order.remote_payment_id.as_deref(), Some("pay_1"));
}

#[tokio::test]
async fn test_verify_accepts_string_local_id() {
    let ctx = TestContext::new();
    let (remote_order_id, local_id) = create_order(&ctx).await;

    let (status, _) = send(
        &ctx,
        post_json(
            "/payments/verify",
            &json!({
                "razorpay_order_id": remote_order_id,
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": ctx.gateway.sign(&remote_order_id, "pay_1"),
                "payment_db_id": local_id.to_string(),
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let order = ctx
        .store
        .find_by_id(PaymentOrderId::new(local_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, PaymentStatus::Captured);
}

#[tokio::test]
async fn test_verify_invalid_signature() {
    let ctx = TestContext::new();
    let (remote_order_id, local_id) = create_order(&ctx).await;

    let (status, body) = send(
        &ctx,
        post_json(
            "/payments/verify",
            &json!({
                "razorpay_order_id": remote_order_id,
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": "deadbeef",
                "payment_db_id": local_id,
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "message": "Invalid signature"}));
    assert_eq!(ctx.gateway.payments_fetched(), 0);

    let order = ctx
        .store
        .find_by_id(PaymentOrderId::new(local_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, PaymentStatus::Created);
}

#[tokio::test]
async fn test_verify_missing_fields() {
    let ctx = TestContext::new();

    let (status, body) = send(&ctx, post_json("/payments/verify", &json!({}))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["errors"],
        json!({
            "razorpay_order_id": ["The razorpay order id field is required."],
            "razorpay_payment_id": ["The razorpay payment id field is required."],
            "razorpay_signature": ["The razorpay signature field is required."],
        })
    );
    assert_eq!(
        body["message"],
        json!("The razorpay order id field is required. (and 2 more errors)")
    );
    assert_eq!(ctx.gateway.payments_fetched(), 0);
}

#[tokio::test]
async fn test_verify_rejects_non_integer_local_id() {
    let ctx = TestContext::new();

    let (status, body) = send(
        &ctx,
        post_json(
            "/payments/verify",
            &json!({
                "razorpay_order_id": "order_1",
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": ctx.gateway.sign("order_1", "pay_1"),
                "payment_db_id": "seven",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["errors"]["payment_db_id"],
        json!(["The payment db id must be an integer."])
    );
}

#[tokio::test]
async fn test_verify_gateway_failure() {
    let ctx = TestContext::with_gateway(FakeGateway::new().failing_fetch());

    let (status, body) = send(
        &ctx,
        post_json(
            "/payments/verify",
            &json!({
                "razorpay_order_id": "order_1",
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": ctx.gateway.sign("order_1", "pay_1"),
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
}

// =============================================================================
// GET /payments/{id}
// =============================================================================

#[tokio::test]
async fn test_show_order() {
    let ctx = TestContext::new();
    let (remote_order_id, local_id) = create_order(&ctx).await;

    let (status, body) = send(&ctx, get(&format!("/payments/{local_id}"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["payment"]["id"], json!(local_id));
    assert_eq!(body["payment"]["remote_order_id"], json!(remote_order_id));
    assert_eq!(body["payment"]["status"], json!("created"));
    assert_eq!(body["payment"]["amount_minor"], json!(50_000));
}

#[tokio::test]
async fn test_show_missing_order() {
    let ctx = TestContext::new();

    let (status, body) = send(&ctx, get("/payments/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(&ctx, get("/payments/not-a-number")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// /api/payments prefix
// =============================================================================

#[tokio::test]
async fn test_api_prefix_serves_payment_routes() {
    let ctx = TestContext::new();

    let (status, body) = send(
        &ctx,
        post_json("/api/payments/create-order", &json!({"amount": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let remote_order_id = body["order"]["id"].as_str().unwrap().to_string();
    let local_id = body["payment_db_id"].as_i64().unwrap();

    let (status, body) = send(
        &ctx,
        post_json(
            "/api/payments/verify",
            &json!({
                "razorpay_order_id": remote_order_id,
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": ctx.gateway.sign(&remote_order_id, "pay_1"),
                "payment_db_id": local_id,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let (status, body) = send(&ctx, get(&format!("/api/payments/{local_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment"]["status"], json!("captured"));
}
