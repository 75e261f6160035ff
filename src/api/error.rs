use crate::core::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

/// Unified error type for API responses.
#[derive(Debug)]
pub enum ApiError {
    /// The rate source produced no value.
    RateUnavailable,
    BadRequest(String),
    NotFound(String),
    Store(StoreError),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateUnavailable => write!(f, "rate_unavailable"),
            Self::BadRequest(msg) => write!(f, "bad_request: {msg}"),
            Self::NotFound(msg) => write!(f, "not_found: {msg}"),
            Self::Store(e) => write!(f, "store_error: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl ApiError {
    /// Status and client-facing message. Store details stay in the logs.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::RateUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not obtain the rate from the source".to_string(),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Store(e) => {
                error!("Store operation failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Rate storage is unavailable".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

/// Error body for the refresh endpoint, which also carries `"ok": false`.
#[derive(Debug)]
pub struct RefreshError(pub ApiError);

impl From<StoreError> for RefreshError {
    fn from(e: StoreError) -> Self {
        Self(ApiError::Store(e))
    }
}

impl IntoResponse for RefreshError {
    fn into_response(self) -> Response {
        let (status, message) = self.0.status_and_message();
        (status, axum::Json(json!({ "error": message, "ok": false }))).into_response()
    }
}
