//! Mapping of bridge errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use capbridge_engine::BridgeError;
use serde::Serialize;
use tracing::warn;

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// A bridge error on its way to the client
#[derive(Debug)]
pub struct ApiError(pub BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    /// HTTP status for the wrapped error
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BridgeError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            BridgeError::AlreadyStarted | BridgeError::NotStarted => StatusCode::CONFLICT,
            BridgeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            e if e.is_caller_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, code = self.0.error_code(), "Request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            code: self.0.error_code(),
        };
        (status, Json(body)).into_response()
    }
}
