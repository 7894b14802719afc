//! # Web API Error Types
//!
//! Error types specific to the web surface and their HTTP response
//! conversions. Leverages thiserror for structure and Axum's IntoResponse
//! for the wire format.

use crate::services::CheckoutError;
use crate::state_machine::StateMachineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Web API specific errors with HTTP status code mappings
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found")]
    NotFound,

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    /// Request is well-formed but the order's state forbids it
    /// (e.g. cancelling a shipped order)
    #[error("Unprocessable: {message}")]
    Unprocessable { message: String },

    #[error("Payment gateway unavailable")]
    GatewayUnavailable,

    #[error("Database operation failed: {operation}")]
    DatabaseError { operation: String },

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Create a BadRequest error with a custom message
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::Unprocessable {
            message: message.into(),
        }
    }

    /// Create a DatabaseError with operation context
    pub fn database_error(operation: impl Into<String>) -> Self {
        Self::DatabaseError {
            operation: operation.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_code, message) = match &self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found"),

            ApiError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message.as_str())
            }

            ApiError::Unprocessable { message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE",
                message.as_str(),
            ),

            ApiError::GatewayUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "GATEWAY_UNAVAILABLE",
                "Payment gateway unavailable, please try again later",
            ),

            ApiError::DatabaseError { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database operation failed",
            ),

            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status_code, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::database_error(e.to_string())
    }
}

impl From<CheckoutError> for ApiError {
    fn from(e: CheckoutError) -> Self {
        use crate::mpesa::MpesaError;

        match e {
            CheckoutError::OrderNotFound => ApiError::NotFound,
            CheckoutError::EmptyOrder => ApiError::unprocessable("Order has no line items"),
            CheckoutError::OrderNotOpen => {
                ApiError::unprocessable("Order is not open for payment")
            }
            CheckoutError::Gateway(MpesaError::InvalidPhoneNumber(phone)) => {
                ApiError::bad_request(format!("Invalid phone number format: {phone}"))
            }
            // Surfaced as a generic failure; details stay in the logs
            CheckoutError::Gateway(_) => ApiError::GatewayUnavailable,
            // Correlation-id collisions never surface to a user
            CheckoutError::PaymentStore(_) => ApiError::Internal,
            CheckoutError::Database(e) => ApiError::database_error(e.to_string()),
        }
    }
}

impl From<StateMachineError> for ApiError {
    fn from(e: StateMachineError) -> Self {
        match e {
            StateMachineError::InvalidTransition { from, event } => ApiError::unprocessable(
                format!("Cannot {event} an order in the {from} state"),
            ),
            StateMachineError::Database(e) => ApiError::database_error(e.to_string()),
            StateMachineError::Internal(_) => ApiError::Internal,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_maps_to_422() {
        let api_error: ApiError = StateMachineError::InvalidTransition {
            from: "shipped".to_string(),
            event: "cancel".to_string(),
        }
        .into();
        let response = api_error.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_empty_cart_maps_to_422() {
        let api_error: ApiError = CheckoutError::EmptyOrder.into();
        let response = api_error.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_invalid_phone_maps_to_400() {
        let api_error: ApiError = CheckoutError::Gateway(
            crate::mpesa::MpesaError::InvalidPhoneNumber("12345".to_string()),
        )
        .into();
        let response = api_error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_gateway_failure_maps_to_503() {
        let api_error: ApiError = CheckoutError::Gateway(
            crate::mpesa::MpesaError::GatewayUnavailable("timeout".to_string()),
        )
        .into();
        let response = api_error.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
