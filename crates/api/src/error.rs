//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::SagaError;
use thiserror::Error;

use crate::routes::orders::OrderResponse;

/// API-level error type that maps to HTTP responses.
///
/// The body is always `{"success": false, "message": ...}`; an order that
/// failed its inventory check is returned alongside as `order`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Saga execution error.
    #[error(transparent)]
    Saga(#[from] SagaError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, order) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Saga(err) => saga_error_to_response(err),
        };

        let mut body = serde_json::json!({ "success": false, "message": message });
        if let Some(order) = order {
            body["order"] = serde_json::to_value(order).unwrap_or_default();
        }
        (status, Json(body)).into_response()
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String, Option<OrderResponse>) {
    match err {
        SagaError::Validation(_) | SagaError::InvalidPageToken(_) => {
            (StatusCode::BAD_REQUEST, err.to_string(), None)
        }
        SagaError::NotFound(_) => (StatusCode::NOT_FOUND, "Order not found".to_string(), None),
        SagaError::InvalidTransition { .. } | SagaError::ConcurrentModification { .. } => {
            (StatusCode::CONFLICT, err.to_string(), None)
        }
        SagaError::InsufficientInventory { order, product_id } => {
            tracing::info!(order_id = %order.order_id(), %product_id, "order rejected");
            (
                StatusCode::CONFLICT,
                "Insufficient inventory".to_string(),
                Some(OrderResponse::from(order.as_ref())),
            )
        }
        SagaError::Persistence(e) => {
            tracing::error!(error = %e, "state store error");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Failed to access order storage".to_string(),
                None,
            )
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
