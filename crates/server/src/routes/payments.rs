//! Payment route handlers.
//!
//! Request bodies are JSON. Fields are read as loose JSON values and checked
//! here so every bad input produces a 422 with per-field messages instead of
//! a bare deserialization error.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use payflow_core::PaymentOrderId;

use crate::error::{AppError, Result};
use crate::gateway::{RemoteOrder, RemotePayment};
use crate::middleware::{ClientIp, OptionalUser, RequestId};
use crate::models::PaymentOrder;
use crate::services::{
    CallerContext, CheckoutOptions, CreateOrderInput, ValidationErrors, VerifyInput,
};
use crate::state::AppState;

/// Create-order request body.
#[derive(Debug, Default, Deserialize)]
pub struct CreateOrderBody {
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub upi_option: Option<Value>,
    #[serde(default)]
    pub card_option: Option<Value>,
}

/// Create-order response body.
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: RemoteOrder,
    pub payment_db_id: PaymentOrderId,
    pub key: String,
}

/// Verify request body, as posted by the checkout handler.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyBody {
    #[serde(default)]
    pub razorpay_order_id: Option<Value>,
    #[serde(default)]
    pub razorpay_payment_id: Option<Value>,
    #[serde(default)]
    pub razorpay_signature: Option<Value>,
    #[serde(default)]
    pub payment_db_id: Option<Value>,
}

/// Verify response body.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub payment: RemotePayment,
}

/// Order lookup response body.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub payment: PaymentOrder,
}

fn parse_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(body)| body).map_err(|rejection| {
        ValidationErrors::single("body", format!("The request body is invalid: {rejection}"))
            .into()
    })
}

/// Parse a rupee amount from a JSON number or numeric string.
fn parse_amount(value: Option<&Value>, errors: &mut ValidationErrors) -> Option<Decimal> {
    let text = match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(_) => {
            errors.add("amount", "The amount must be a number.");
            return None;
        }
    };

    let Some(text) = text else {
        errors.add("amount", "The amount field is required.");
        return None;
    };

    let parsed = is_numeric(&text)
        .then(|| Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)).ok())
        .flatten();
    if parsed.is_none() {
        errors.add("amount", "The amount must be a number.");
    }
    parsed
}

/// Plain decimal notation: optional sign, digits with an optional fraction,
/// optional exponent. No digit separators.
fn is_numeric(text: &str) -> bool {
    /// Strip leading ASCII digits, returning how many there were.
    fn digits(s: &str) -> (usize, &str) {
        let rest = s.trim_start_matches(|c: char| c.is_ascii_digit());
        (s.len() - rest.len(), rest)
    }

    let s = text.strip_prefix(['+', '-']).unwrap_or(text);

    let (whole, mut rest) = digits(s);
    let mut fraction = 0;
    if let Some(after_point) = rest.strip_prefix('.') {
        (fraction, rest) = digits(after_point);
    }
    if whole + fraction == 0 {
        return false;
    }

    if let Some(exponent) = rest.strip_prefix(['e', 'E']) {
        let exponent = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        let (n, rest) = digits(exponent);
        return n > 0 && rest.is_empty();
    }
    rest.is_empty()
}

/// Read a required, non-empty string field.
fn required_string(
    value: Option<Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let label = field.replace('_', " ");
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        None | Some(Value::Null | Value::String(_)) => {
            errors.add(field, format!("The {label} field is required."));
            None
        }
        Some(_) => {
            errors.add(field, format!("The {label} must be a string."));
            None
        }
    }
}

/// Read an optional integer id from a JSON number or digit string.
fn optional_id(
    value: Option<Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<PaymentOrderId> {
    let parsed = match value {
        None | Some(Value::Null) => return None,
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) if s.trim().is_empty() => return None,
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    if parsed.is_none() {
        let label = field.replace('_', " ");
        errors.add(field, format!("The {label} must be an integer."));
    }
    parsed.map(PaymentOrderId::new)
}

/// `POST /payments/create-order`
#[instrument(skip_all, fields(user_id = ?user_id))]
pub async fn create_order(
    State(state): State<AppState>,
    OptionalUser(user_id): OptionalUser,
    body: std::result::Result<Json<CreateOrderBody>, JsonRejection>,
) -> Result<Json<CreateOrderResponse>> {
    let body = parse_body(body)?;

    let mut errors = ValidationErrors::new();
    let amount = parse_amount(body.amount.as_ref(), &mut errors);
    let Some(amount) = amount.filter(|_| errors.is_empty()) else {
        return Err(errors.into());
    };

    let created = state
        .payments()
        .create_order(CreateOrderInput {
            amount,
            user_id,
            options: CheckoutOptions {
                upi_option: body.upi_option,
                card_option: body.card_option,
            },
        })
        .await?;

    Ok(Json(CreateOrderResponse {
        order: created.order,
        payment_db_id: created.payment_db_id,
        key: created.key,
    }))
}

/// `POST /payments/verify`
#[instrument(skip_all, fields(client_ip = ?client_ip))]
pub async fn verify(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    request_id: RequestId,
    body: std::result::Result<Json<VerifyBody>, JsonRejection>,
) -> Result<Json<VerifyResponse>> {
    let body = parse_body(body)?;

    let mut errors = ValidationErrors::new();
    let remote_order_id = required_string(body.razorpay_order_id, "razorpay_order_id", &mut errors);
    let remote_payment_id =
        required_string(body.razorpay_payment_id, "razorpay_payment_id", &mut errors);
    let signature = required_string(body.razorpay_signature, "razorpay_signature", &mut errors);
    let local_order_id = optional_id(body.payment_db_id, "payment_db_id", &mut errors);

    let (Some(remote_order_id), Some(remote_payment_id), Some(signature)) =
        (remote_order_id, remote_payment_id, signature)
    else {
        return Err(errors.into());
    };
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let caller = CallerContext {
        client_ip,
        request_id: Some(request_id.0).filter(|id| !id.is_empty()),
    };

    let verified = state
        .payments()
        .verify_payment(
            VerifyInput {
                remote_order_id,
                remote_payment_id,
                signature,
                local_order_id,
            },
            &caller,
        )
        .await?;

    Ok(Json(VerifyResponse {
        success: true,
        payment: verified.payment,
    }))
}

/// `GET /payments/{id}`
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<OrderResponse>> {
    let Ok(Path(id)) = id else {
        return Err(AppError::NotFound("payment order".to_string()));
    };

    let order = state.payments().find_order(PaymentOrderId::new(id)).await?;

    Ok(Json(OrderResponse {
        success: true,
        payment: order,
    }))
}
