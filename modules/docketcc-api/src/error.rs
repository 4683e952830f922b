use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use docketcc_common::DocketError;
use docketcc_store::StoreError;
use serde_json::json;
use tracing::warn;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest(String),
    NotFound(String),
    /// A poll is already in flight.
    Busy,
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<DocketError>() {
            Ok(invalid) => ApiError::BadRequest(invalid.to_string()),
            Err(other) => ApiError::Internal(other),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(e) => ApiError::BadRequest(e.to_string()),
            StoreError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<DocketError> for ApiError {
    fn from(err: DocketError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {what}")),
            ApiError::Busy => (
                StatusCode::CONFLICT,
                "A poll is already running".to_string(),
            ),
            ApiError::Internal(e) => {
                warn!(error = %e, "Admin request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
