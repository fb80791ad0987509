use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use crate::InventoryError;

#[derive(Debug)]
pub enum ApiError {
    Inventory(InventoryError),
    Validation(validator::ValidationErrors),
    Unauthorized,
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self { Self::Inventory(err) }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self { Self::Validation(err) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            Self::Unauthorized => {
                let body = serde_json::json!({"error": "unauthorized", "message": "missing x-actor-id header"});
                return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
            }
            Self::Validation(errors) => {
                let body = serde_json::json!({"error": "validation", "message": errors.to_string()});
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
            }
            Self::Inventory(err) => err,
        };

        let (status, code) = match &err {
            InventoryError::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
            InventoryError::InvalidQuantity(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_quantity"),
            InventoryError::MissingReason => (StatusCode::UNPROCESSABLE_ENTITY, "missing_reason"),
            InventoryError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            InventoryError::LockTimeout { .. } => (StatusCode::SERVICE_UNAVAILABLE, "lock_timeout"),
            InventoryError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "inventory request failed");
        }

        let mut body = serde_json::json!({"error": code, "message": err.to_string(), "retryable": err.is_retryable()});
        if let InventoryError::InsufficientStock { shortages } = &err {
            body["shortages"] = serde_json::json!(shortages);
        }
        let mut resp = (status, Json(body)).into_response();
        if err.is_retryable() {
            resp.headers_mut().insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        }
        resp
    }
}
