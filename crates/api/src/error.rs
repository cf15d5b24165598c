//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use event_store::EventStoreError;
use orders::OrderError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Command path error.
    Order(OrderError),
    /// Event store query error.
    EventStore(EventStoreError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::EventStore(err) => {
                tracing::error!(error = %err, "event store query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, String) {
    match &err {
        OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        OrderError::InsufficientStock { .. } | OrderError::InvalidQuantity { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        OrderError::CannotPay { .. }
        | OrderError::AlreadyCancelled(_)
        | OrderError::CannotCancelCompleted(_) => (StatusCode::CONFLICT, err.to_string()),
        OrderError::Repository(_)
        | OrderError::EventStore(_)
        | OrderError::Broker(_)
        | OrderError::Serialization(_) => {
            tracing::error!(error = %err, "command failed on infrastructure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<EventStoreError> for ApiError {
    fn from(err: EventStoreError) -> Self {
        ApiError::EventStore(err)
    }
}
