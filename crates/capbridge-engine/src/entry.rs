//! Bridge entries
//!
//! A [`BridgeEntry`] is the live pairing of one source device with one
//! protocol endpoint. Its lifecycle state sits behind an async RwLock:
//! update and command paths hold a read guard while they work, teardown
//! takes the write guard, so an in-flight update either completes before
//! teardown or is dropped after it.

use capbridge_core::{
    AttributeSnapshot, CapabilityValue, Device, DeviceId, EndpointId, EndpointShape,
    InboundCommand,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock as AsyncRwLock;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::adapter::DeviceAdapter;
use crate::binding::CapabilityTable;
use crate::error::Result;
use crate::gateway::ProtocolGateway;
use crate::handler::CommandHandler;
use crate::mapper::{capability_values, Synthesis};
use crate::stats::StatsRecorder;
use crate::task::bounded;
use crate::translator::{self, CapabilityValues};

/// Lifecycle state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Endpoint being registered and subscriptions being made
    Initializing,
    /// Forwarding updates and commands
    Active,
    /// Being torn down; events are dropped
    Uninitializing,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryState::Initializing => write!(f, "Initializing"),
            EntryState::Active => write!(f, "Active"),
            EntryState::Uninitializing => write!(f, "Uninitializing"),
        }
    }
}

/// Last known capability values of a device
#[derive(Debug, Default)]
pub struct ValueCache {
    values: RwLock<CapabilityValues>,
}

impl ValueCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a device's current values
    pub fn from_device(device: &Device) -> Self {
        Self {
            values: RwLock::new(capability_values(device)),
        }
    }

    /// Record a value
    pub fn set(&self, capability_id: &str, value: CapabilityValue) {
        self.values.write().insert(capability_id.to_string(), value);
    }

    /// Read a value
    pub fn get(&self, capability_id: &str) -> Option<CapabilityValue> {
        self.values.read().get(capability_id).cloned()
    }

    /// Copy of every value
    pub fn snapshot(&self) -> CapabilityValues {
        self.values.read().clone()
    }

    /// Record the light mode a change to `capability_id` implies, if any
    pub fn note_color_change(&self, table: &CapabilityTable, capability_id: &str) {
        if let Some(mode) = translator::implied_light_mode(table, capability_id) {
            self.set(translator::light_mode_key(table), mode.into());
        }
    }
}

/// Serializable summary of an entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    /// Device id
    pub device_id: DeviceId,
    /// Endpoint id
    pub endpoint_id: EndpointId,
    /// Rule that produced the endpoint
    pub rule: &'static str,
    /// Endpoint shape
    pub shape: EndpointShape,
    /// Lifecycle state
    pub state: EntryState,
    /// When the entry became active
    pub activated_at: Option<DateTime<Utc>>,
}

/// A bridged device and its endpoint
pub struct BridgeEntry {
    device_id: DeviceId,
    endpoint_id: EndpointId,
    rule: &'static str,
    shape: EndpointShape,
    table: CapabilityTable,
    adapter: Arc<DeviceAdapter>,
    values: Arc<ValueCache>,
    state: AsyncRwLock<EntryState>,
    registered: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    activated_at: Mutex<Option<DateTime<Utc>>>,
}

impl fmt::Debug for BridgeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeEntry")
            .field("device_id", &self.device_id)
            .field("rule", &self.rule)
            .field("device_type", &self.shape.device_type)
            .finish_non_exhaustive()
    }
}

impl BridgeEntry {
    /// Create an entry in the `Initializing` state
    pub fn new(device: &Device, synthesis: Synthesis, adapter: Arc<DeviceAdapter>) -> Self {
        Self {
            device_id: device.id.clone(),
            endpoint_id: EndpointId(device.id.to_string()),
            rule: synthesis.rule,
            shape: synthesis.shape,
            table: synthesis.table,
            adapter,
            values: Arc::new(ValueCache::from_device(device)),
            state: AsyncRwLock::new(EntryState::Initializing),
            registered: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            activated_at: Mutex::new(None),
        }
    }

    /// Device id
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Endpoint id
    pub fn endpoint_id(&self) -> &EndpointId {
        &self.endpoint_id
    }

    /// Rule that produced the endpoint
    pub fn rule(&self) -> &'static str {
        self.rule
    }

    /// Endpoint shape as synthesized
    pub fn shape(&self) -> &EndpointShape {
        &self.shape
    }

    /// Capability bindings
    pub fn table(&self) -> &CapabilityTable {
        &self.table
    }

    /// Device adapter
    pub fn adapter(&self) -> &Arc<DeviceAdapter> {
        &self.adapter
    }

    /// Current lifecycle state
    pub async fn state(&self) -> EntryState {
        *self.state.read().await
    }

    /// Check for the `Active` state
    pub async fn is_active(&self) -> bool {
        self.state().await == EntryState::Active
    }

    /// Number of live capability subscriptions
    pub async fn subscription_count(&self) -> usize {
        self.adapter.subscription_count().await
    }

    /// Last known capability values
    pub fn values(&self) -> CapabilityValues {
        self.values.snapshot()
    }

    /// Command handler for this entry
    pub fn handler(&self, stats: Arc<StatsRecorder>) -> CommandHandler {
        CommandHandler::new(
            self.adapter.clone(),
            self.table.clone(),
            self.values.clone(),
            stats,
        )
    }

    /// Summary for diagnostics
    pub async fn info(&self) -> EntryInfo {
        EntryInfo {
            device_id: self.device_id.clone(),
            endpoint_id: self.endpoint_id.clone(),
            rule: self.rule,
            shape: self.shape.clone(),
            state: self.state().await,
            activated_at: *self.activated_at.lock(),
        }
    }

    pub(crate) fn mark_registered(&self) {
        self.registered.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub(crate) fn attach_task(&self, task: JoinHandle<()>) {
        self.tasks.lock().push(task);
    }

    /// Record a capability change and push its patch if active
    pub(crate) async fn apply_capability_change(
        &self,
        gateway: &dyn ProtocolGateway,
        capability_id: &str,
        value: CapabilityValue,
        timeout: Duration,
        stats: &StatsRecorder,
    ) -> Result<()> {
        self.values.set(capability_id, value);
        self.values.note_color_change(&self.table, capability_id);

        let state = self.state.read().await;
        if *state != EntryState::Active {
            let current = *state;
            trace!(
                device_id = %self.device_id,
                capability = %capability_id,
                state = %current,
                "Dropping capability change for inactive entry"
            );
            stats.record(|s| s.updates_dropped += 1);
            return Ok(());
        }

        let patch = translator::forward(&self.table, &self.values.snapshot(), capability_id);
        if patch.is_empty() {
            return Ok(());
        }
        self.push(gateway, patch, timeout, stats).await
    }

    async fn push(
        &self,
        gateway: &dyn ProtocolGateway,
        patch: AttributeSnapshot,
        timeout: Duration,
        stats: &StatsRecorder,
    ) -> Result<()> {
        let result = bounded(
            "set_attributes",
            timeout,
            gateway.set_attributes(&self.endpoint_id, patch),
        )
        .await;
        match &result {
            Ok(()) => stats.record(|s| s.updates_forwarded += 1),
            Err(_) => stats.record(|s| s.update_errors += 1),
        }
        result
    }

    /// Run an inbound command while the entry stays active
    ///
    /// Returns `false` without touching the device when the entry is not
    /// active. Teardown waits for a command that is already running.
    pub(crate) async fn handle_command(
        &self,
        handler: &CommandHandler,
        command: InboundCommand,
    ) -> Result<bool> {
        let state = self.state.read().await;
        if *state != EntryState::Active {
            return Ok(false);
        }
        handler.handle(command).await?;
        Ok(true)
    }

    /// Push a patch directly, bypassing capability translation
    pub(crate) async fn push_patch(
        &self,
        gateway: &dyn ProtocolGateway,
        patch: AttributeSnapshot,
        timeout: Duration,
        stats: &StatsRecorder,
    ) -> Result<()> {
        let state = self.state.read().await;
        if *state != EntryState::Active {
            return Ok(());
        }
        self.push(gateway, patch, timeout, stats).await
    }

    /// Move to `Active`
    ///
    /// Changes that arrived while initializing were cached but not pushed;
    /// if they moved the endpoint away from its initial snapshot, the
    /// current snapshot is pushed once.
    pub(crate) async fn activate(
        &self,
        gateway: &dyn ProtocolGateway,
        timeout: Duration,
        stats: &StatsRecorder,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let current = translator::snapshot(&self.table, &self.values.snapshot());
        if current != self.shape.attributes {
            debug!(device_id = %self.device_id, "Resynchronizing changes made during initialization");
            self.push(gateway, current, timeout, stats).await?;
        }
        *state = EntryState::Active;
        *self.activated_at.lock() = Some(Utc::now());
        Ok(())
    }

    /// Move to `Uninitializing` and stop the entry's tasks
    ///
    /// Waits for in-flight updates and commands holding the state guard.
    pub(crate) async fn begin_teardown(&self) {
        {
            let mut state = self.state.write().await;
            *state = EntryState::Uninitializing;
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
