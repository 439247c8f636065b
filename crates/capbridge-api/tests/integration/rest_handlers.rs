//! REST API handler behavior tests
//!
//! These tests call the handlers directly with a bridge wired to the
//! in-memory platform and gateway.

use axum::{extract::State, Json};
use capbridge_api::server::rest::{self, DeviceRequest};
use capbridge_api::AppState;
use capbridge_engine::test_utils::{
    dimmable_light, unsupported_device, TestBridge, TEST_QR_PAIRING_CODE,
};
use capbridge_engine::BridgeError;
use std::sync::Arc;

async fn app(started: bool) -> (TestBridge, Arc<AppState>) {
    let bridge = TestBridge::new(vec![dimmable_light("d1", true, 0.5), unsupported_device("s1")]);
    if started {
        bridge.manager.start().await.unwrap();
    }
    let state = Arc::new(AppState::new(bridge.manager.clone()));
    (bridge, state)
}

fn request(id: &str) -> Json<DeviceRequest> {
    Json(DeviceRequest {
        device_id: id.into(),
    })
}

// ============ Health / Info ============

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    assert_eq!(rest::health().await, "OK");
}

#[tokio::test]
async fn test_bridge_info() {
    let (_bridge, state) = app(false).await;
    let Json(info) = rest::bridge_info(State(state)).await;
    assert_eq!(info.unique_id, "test-hub");
    assert_eq!(info.port, 5540);
    assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
}

// ============ State ============

#[tokio::test]
async fn test_state_before_start() {
    let (_bridge, state) = app(false).await;
    let Json(bridge_state) = rest::get_state(State(state)).await;
    assert!(!bridge_state.ready);

    let json = serde_json::to_value(&bridge_state).unwrap();
    assert_eq!(json["ready"], false);
    assert!(json["qrPairingCode"].is_null());
}

#[tokio::test]
async fn test_state_after_start() {
    let (_bridge, state) = app(true).await;
    let Json(bridge_state) = rest::get_state(State(state)).await;
    assert!(bridge_state.ready);
    assert_eq!(bridge_state.qr_pairing_code.as_deref(), Some(TEST_QR_PAIRING_CODE));
}

// ============ Devices ============

#[tokio::test]
async fn test_list_devices() {
    let (_bridge, state) = app(true).await;
    let Json(devices) = rest::list_devices(State(state)).await.unwrap();
    assert_eq!(devices.len(), 2);

    let json = serde_json::to_value(&devices[0]).unwrap();
    assert_eq!(json["id"], "d1");
    assert_eq!(json["isSelected"], false);
    assert!(json.get("zoneName").is_some());
    assert!(json.get("iconUrl").is_some());
}

#[tokio::test]
async fn test_enable_and_disable() {
    let (bridge, state) = app(true).await;

    let Json(selection) = rest::enable_device(State(state.clone()), request("d1"))
        .await
        .unwrap();
    assert!(selection.is_selected);
    assert!(selection.is_bridged);
    assert!(bridge.gateway.has_endpoint(&"d1".into()));

    let Json(selection) = rest::disable_device(State(state.clone()), request("d1"))
        .await
        .unwrap();
    assert!(!selection.is_selected);
    assert!(!selection.is_bridged);
    assert!(!bridge.gateway.has_endpoint(&"d1".into()));
}

#[tokio::test]
async fn test_enable_unsupported_device() {
    let (_bridge, state) = app(true).await;
    let Json(selection) = rest::enable_device(State(state), request("s1"))
        .await
        .unwrap();
    assert!(selection.is_selected);
    assert!(!selection.is_bridged);
}

#[tokio::test]
async fn test_enable_unknown_device() {
    let (_bridge, state) = app(true).await;
    let err = rest::enable_device(State(state), request("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err.0, BridgeError::DeviceNotFound(_)));
}

#[tokio::test]
async fn test_enable_before_start_is_rejected() {
    let (bridge, state) = app(false).await;
    let err = rest::enable_device(State(state), request("d1"))
        .await
        .unwrap_err();
    assert!(matches!(err.0, BridgeError::NotStarted));
    assert_eq!(bridge.manager.entry_count(), 0);
}

// ============ Stats / Entries ============

#[tokio::test]
async fn test_stats_and_entries() {
    let (_bridge, state) = app(true).await;
    rest::enable_device(State(state.clone()), request("d1"))
        .await
        .unwrap();

    let Json(stats) = rest::get_stats(State(state.clone())).await;
    assert_eq!(stats.active_endpoints, 1);

    let Json(entries) = rest::list_entries(State(state)).await;
    assert_eq!(entries.len(), 1);
    let json = serde_json::to_value(&entries[0]).unwrap();
    assert_eq!(json["deviceId"], "d1");
    assert_eq!(json["state"], "active");
}
