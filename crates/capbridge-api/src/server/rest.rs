//! REST API endpoints

use axum::{extract::State, Json};
use capbridge_core::DeviceId;
use capbridge_engine::{BridgeError, BridgeState, BridgeStats, DeviceSummary, EntryInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use crate::AppState;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Bridge info endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeInfo {
    pub version: &'static str,
    pub name: String,
    pub unique_id: String,
    pub port: u16,
    pub uptime_seconds: u64,
}

pub async fn bridge_info(State(state): State<Arc<AppState>>) -> Json<BridgeInfo> {
    let server = &state.bridge.config().server;
    Json(BridgeInfo {
        version: env!("CARGO_PKG_VERSION"),
        name: server.device_name.clone(),
        unique_id: server.unique_id.clone(),
        port: server.port,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// Readiness and pairing codes
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<BridgeState> {
    Json(state.bridge.get_state())
}

/// Bridge counters
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<BridgeStats> {
    Json(state.bridge.stats())
}

/// List the device catalog
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeviceSummary>>, ApiError> {
    Ok(Json(state.bridge.get_devices().await?))
}

/// List live bridge entries
pub async fn list_entries(State(state): State<Arc<AppState>>) -> Json<Vec<EntryInfo>> {
    Json(state.bridge.entries().await)
}

/// Body of enable/disable requests
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    pub device_id: DeviceId,
}

/// Selection state after an enable/disable request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSelection {
    pub device_id: DeviceId,
    pub is_selected: bool,
    pub is_bridged: bool,
}

fn require_started(state: &AppState) -> Result<(), ApiError> {
    if state.bridge.is_started() {
        Ok(())
    } else {
        Err(BridgeError::NotStarted.into())
    }
}

async fn selection(state: &AppState, device_id: DeviceId) -> DeviceSelection {
    DeviceSelection {
        is_selected: state.bridge.is_enabled(&device_id).await,
        is_bridged: state.bridge.entry(&device_id).is_some(),
        device_id,
    }
}

/// Bridge a device
pub async fn enable_device(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeviceRequest>,
) -> Result<Json<DeviceSelection>, ApiError> {
    require_started(&state)?;
    info!(device_id = %request.device_id, "Enable requested");
    state.bridge.enable_device(&request.device_id).await?;
    Ok(Json(selection(&state, request.device_id).await))
}

/// Unbridge a device
pub async fn disable_device(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeviceRequest>,
) -> Result<Json<DeviceSelection>, ApiError> {
    require_started(&state)?;
    info!(device_id = %request.device_id, "Disable requested");
    state.bridge.disable_device(&request.device_id).await?;
    Ok(Json(selection(&state, request.device_id).await))
}
