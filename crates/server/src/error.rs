//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error body has the shape `{"success": false, "message": ...}`;
//! validation failures add an `errors` map of field to messages.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{PaymentError, ValidationErrors};

/// Application-level error type for the payment server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Payment operation failed.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Payment(PaymentError::Validation(errors))
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        Self::Payment(PaymentError::Repository(err))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a ValidationErrors>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Payment(err) => match err {
                PaymentError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                PaymentError::InvalidSignature => StatusCode::BAD_REQUEST,
                PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
                PaymentError::Gateway(_) | PaymentError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Payment(PaymentError::Gateway(_) | PaymentError::Repository(_))
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose store or internal details to clients
        let message = match &self {
            Self::Payment(PaymentError::Repository(_)) => "Internal server error".to_string(),
            Self::Payment(err) => err.to_string(),
            Self::NotFound(_) => self.to_string(),
        };

        let errors = match &self {
            Self::Payment(PaymentError::Validation(errors)) => Some(errors),
            _ => None,
        };

        let body = ErrorBody {
            success: false,
            message,
            errors,
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this once the trusted user header has been read so errors are
/// associated with the paying user.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::{Value, json};

    use super::*;
    use crate::gateway::GatewayError;
    use payflow_core::PaymentOrderId;

    async fn body_json(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("payment order 7".to_string());
        assert_eq!(err.to_string(), "Not found: payment order 7");

        let err = AppError::from(PaymentError::InvalidSignature);
        assert_eq!(err.to_string(), "Invalid signature");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            let response = err.into_response();
            response.status()
        }

        assert_eq!(
            get_status(ValidationErrors::single("amount", "required").into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(PaymentError::InvalidSignature.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(PaymentError::NotFound(PaymentOrderId::new(1)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(PaymentError::Gateway(GatewayError::Timeout).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("amount", "The amount field is required.");
        let (status, body) = body_json(errors.into()).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body,
            json!({
                "success": false,
                "message": "The amount field is required.",
                "errors": {"amount": ["The amount field is required."]}
            })
        );
    }

    #[tokio::test]
    async fn test_signature_body() {
        let (status, body) = body_json(PaymentError::InvalidSignature.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"success": false, "message": "Invalid signature"}));
    }

    #[tokio::test]
    async fn test_gateway_message_is_surfaced() {
        let err = PaymentError::Gateway(GatewayError::Api {
            status: 400,
            message: "The amount must be atleast INR 1.00".to_string(),
        });
        let (status, body) = body_json(err.into()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .contains("The amount must be atleast INR 1.00")
        );
    }

    #[tokio::test]
    async fn test_store_details_are_hidden() {
        let err = RepositoryError::DataCorruption("bad currency XYZ".to_string());
        let (status, body) = body_json(err.into()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"success": false, "message": "Internal server error"})
        );
    }
}
