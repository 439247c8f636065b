//! Capbridge API - Management surface for the capability bridge
//!
//! This crate serves the REST API the settings UI talks to: bridge state
//! and pairing codes, the device catalog, and enabling or disabling
//! individual devices.

pub mod server;

use capbridge_engine::BridgeManager;
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// The bridge being managed
    pub bridge: Arc<BridgeManager>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Wrap a bridge manager
    pub fn new(bridge: Arc<BridgeManager>) -> Self {
        Self {
            bridge,
            start_time: Instant::now(),
        }
    }
}
