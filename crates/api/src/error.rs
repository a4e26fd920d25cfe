//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orchestrator::OrderError;
use serde_json::{Value, json};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or invalid credentials.
    Unauthorized(String),
    /// Authenticated caller does not own the resource.
    Forbidden(String),
    /// Order orchestration error.
    Order(OrderError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, error_body(msg)),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, error_body(msg)),
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, error_body(msg))
            }
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(message: String) -> Value {
    json!({ "error": message })
}

fn order_error_to_response(err: OrderError) -> (StatusCode, Value) {
    match &err {
        OrderError::InsufficientStock {
            product_id,
            available,
            requested,
        } => (
            StatusCode::BAD_REQUEST,
            json!({
                "error": err.to_string(),
                "product_id": product_id,
                "available": available,
                "requested": requested,
            }),
        ),
        OrderError::InvalidRequest(_)
        | OrderError::Identity(_)
        | OrderError::ProductNotFound(_)
        | OrderError::InventoryRejected { .. } => {
            (StatusCode::BAD_REQUEST, error_body(err.to_string()))
        }
        OrderError::InventoryUnavailable(_) => {
            tracing::warn!(error = %err, "inventory service unavailable");
            (StatusCode::BAD_GATEWAY, error_body(err.to_string()))
        }
        OrderError::NotFound(_) => (StatusCode::NOT_FOUND, error_body(err.to_string())),
        OrderError::Persistence(_) => {
            tracing::error!(error = %err, "persistence failure");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(err.to_string()))
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
