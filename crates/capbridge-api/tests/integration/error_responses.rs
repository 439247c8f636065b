//! Error to HTTP response mapping tests

use axum::http::StatusCode;
use axum::response::IntoResponse;
use capbridge_api::server::ApiError;
use capbridge_engine::BridgeError;

#[test]
fn test_status_codes() {
    assert_eq!(
        ApiError(BridgeError::DeviceNotFound("d1".into())).status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(ApiError(BridgeError::AlreadyStarted).status(), StatusCode::CONFLICT);
    assert_eq!(ApiError(BridgeError::NotStarted).status(), StatusCode::CONFLICT);
    assert_eq!(
        ApiError(BridgeError::InvalidConfig("port".into())).status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        ApiError(BridgeError::Timeout {
            operation: "add_endpoint",
            duration_ms: 10
        })
        .status(),
        StatusCode::GATEWAY_TIMEOUT
    );
    assert_eq!(
        ApiError(BridgeError::Settings("disk full".into())).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_error_response_status() {
    let response = ApiError(BridgeError::DeviceNotFound("d1".into())).into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
