//! Error types for the relay.
//!
//! Device and store errors are plain `thiserror` enums; [`ApiError`] wraps
//! them at the HTTP boundary and decides the status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::api::StatusBody;

/// Failure talking to the speaker.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Device or cloud endpoint unreachable, or auth not established.
    #[error("Device connection failed: {0}")]
    ConnectionFailed(String),

    /// Device reachable but the action was rejected.
    #[error("Device command failed: {0}")]
    CommandFailed(String),
}

/// Failure reading or writing the persisted config blob.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error surfaced by an HTTP handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed request field. Never reaches the controller.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Device(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }
        (status, Json(StatusBody::error(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = ApiError::Validation("Missing 'text' parameter".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Missing 'text' parameter");
    }

    #[test]
    fn device_errors_map_to_internal_error() {
        let err: ApiError = DeviceError::CommandFailed("code -704".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Device command failed: code -704");

        let err: ApiError = DeviceError::ConnectionFailed("no auth".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn store_write_errors_map_to_internal_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: ApiError = StoreError::from(io).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
