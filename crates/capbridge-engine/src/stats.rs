//! Bridge statistics

use parking_lot::Mutex;
use serde::Serialize;

/// Bridge statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// Devices with an active endpoint
    pub active_endpoints: u64,
    /// Enabled devices no rule could map
    pub unsupported_devices: u64,
    /// Attribute patches pushed to the gateway
    pub updates_forwarded: u64,
    /// Capability changes dropped because the entry was not active
    pub updates_dropped: u64,
    /// Attribute patches the gateway rejected
    pub update_errors: u64,
    /// Inbound commands received from controllers
    pub commands_received: u64,
    /// Inbound commands that failed
    pub command_errors: u64,
    /// Capability writes undone after a partial compound failure
    pub writes_rolled_back: u64,
    /// Endpoint synthesis failures
    pub synthesis_failures: u64,
    /// Callbacks or command handlers that panicked
    pub panics_isolated: u64,
}

/// Shared, lock-protected statistics
#[derive(Debug, Default)]
pub struct StatsRecorder {
    stats: Mutex<BridgeStats>,
}

impl StatsRecorder {
    /// Create a recorder with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Update counters
    pub fn record(&self, f: impl FnOnce(&mut BridgeStats)) {
        f(&mut self.stats.lock());
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> BridgeStats {
        self.stats.lock().clone()
    }
}
