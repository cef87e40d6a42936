//! API error type and its HTTP mapping

use crate::response::{json_response, ApiResponse};
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use cats_core::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Not Supported: {0}")]
    NotSupported(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Map a storage failure, answering a missing record with `not_found`.
    pub fn from_storage(error: StorageError, not_found: impl Into<String>) -> Self {
        match error {
            StorageError::NotFound(_) => ApiError::NotFound(not_found.into()),
            StorageError::InvalidInput(msg) => ApiError::BadRequest(msg),
            StorageError::Unsupported(msg) => ApiError::NotSupported(msg),
            other => ApiError::internal(other),
        }
    }

    /// A storage failure with no expected outcome, carrying the backend text.
    pub fn internal(error: StorageError) -> Self {
        tracing::error!("Storage error: {}", error);
        ApiError::Internal(error.to_string())
    }

    /// Swap the message of an internal error for a fixed one.
    pub fn or_internal(self, message: impl Into<String>) -> Self {
        match self {
            ApiError::Internal(_) => ApiError::Internal(message.into()),
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotSupported(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::NotSupported(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        json_response(status, &ApiResponse::error(status, self.message()))
    }
}

/// Longest rejection text kept when wrapping a bare error response.
const MAX_BARE_BODY: usize = 16 * 1024;

/// Wrap error responses produced outside the handlers (extractor rejections,
/// timeouts, unmatched routes) in the JSON envelope.
pub async fn envelope_bare_errors(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|value| value.as_bytes().starts_with(b"application/json"));
    if is_json {
        return response;
    }

    let body = axum::body::to_bytes(response.into_body(), MAX_BARE_BODY)
        .await
        .unwrap_or_default();
    let text = String::from_utf8_lossy(&body).trim().to_string();
    let message = if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_lowercase()
    } else {
        text
    };

    tracing::debug!("Wrapping bare {} response: {}", status, message);
    json_response(status, &ApiResponse::error(status, message))
}
