//! In-memory collaborators for testing the bridge
//!
//! [`MockSourcePlatform`] stands in for the home-automation platform and
//! [`MockGateway`] for the protocol server node. Both record what the bridge
//! did to them so tests can assert on it.
//!
//! # Example
//!
//! ```rust,ignore
//! use capbridge_engine::test_utils::{dimmable_light, TestBridge};
//!
//! #[tokio::test]
//! async fn bridges_a_lamp() {
//!     let bridge = TestBridge::new(vec![dimmable_light("d1", true, 0.5)]);
//!     bridge.manager.start().await.unwrap();
//!     bridge.manager.enable_device(&"d1".into()).await.unwrap();
//!     assert!(bridge.gateway.has_endpoint(&"d1".into()));
//! }
//! ```

use async_trait::async_trait;
use capbridge_core::{
    AttributeSnapshot, Capability, CapabilityValue, Device, DeviceId, Driver, EndpointId,
    InboundCommand, Zone,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::bridge::BridgeManager;
use crate::config::{BridgeConfig, BridgeConfigBuilder, ServerNodeOptions};
use crate::error::{BridgeError, Result};
use crate::gateway::{
    CommissioningStatus, EndpointDescriptor, EndpointRegistration, GatewayFactory, GatewayState,
    ProtocolGateway,
};
use crate::settings::MemorySettings;
use crate::source::{CapabilityInstance, CapabilityListener, DeviceEvent, SourcePlatform};

/// QR payload for the default test passcode and discriminator
pub const TEST_QR_PAIRING_CODE: &str = "MT:Y.K9042C00KA0648G00";

/// Manual pairing code for the default test passcode and discriminator
pub const TEST_MANUAL_PAIRING_CODE: &str = "34970112332";

type ListenerMap = HashMap<(DeviceId, String), Vec<(u64, CapabilityListener)>>;

// ============================================================================
// Source platform
// ============================================================================

/// In-memory source platform
pub struct MockSourcePlatform {
    devices: RwLock<HashMap<DeviceId, Device>>,
    drivers: RwLock<HashMap<String, Driver>>,
    zones: RwLock<HashMap<String, Zone>>,
    listeners: Arc<Mutex<ListenerMap>>,
    writes: Mutex<Vec<(DeviceId, String, CapabilityValue)>>,
    failing_capabilities: Mutex<HashSet<String>>,
    events: broadcast::Sender<DeviceEvent>,
    next_instance: AtomicU64,
    connected: AtomicBool,
    echo_writes: AtomicBool,
    write_delay: Mutex<Duration>,
}

impl Default for MockSourcePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSourcePlatform {
    /// Create an empty platform
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            devices: RwLock::new(HashMap::new()),
            drivers: RwLock::new(HashMap::new()),
            zones: RwLock::new(HashMap::new()),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            writes: Mutex::new(Vec::new()),
            failing_capabilities: Mutex::new(HashSet::new()),
            events,
            next_instance: AtomicU64::new(1),
            connected: AtomicBool::new(false),
            echo_writes: AtomicBool::new(true),
            write_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Add a device without emitting an event
    pub fn add_device(&self, device: Device) {
        self.devices.write().insert(device.id.clone(), device);
    }

    /// Add a device and emit `Created`
    pub fn create_device(&self, device: Device) {
        self.add_device(device.clone());
        let _ = self.events.send(DeviceEvent::Created(device));
    }

    /// Replace a device and emit `Updated`
    pub fn update_device(&self, device: Device) {
        self.add_device(device.clone());
        let _ = self.events.send(DeviceEvent::Updated(device));
    }

    /// Remove a device, drop its listeners and emit `Deleted`
    pub fn remove_device(&self, id: &DeviceId) {
        self.devices.write().remove(id);
        self.listeners.lock().retain(|(device_id, _), _| device_id != id);
        let _ = self.events.send(DeviceEvent::Deleted(id.clone()));
    }

    /// Add a driver
    pub fn add_driver(&self, driver: Driver) {
        self.drivers.write().insert(driver.id.clone(), driver);
    }

    /// Add a zone
    pub fn add_zone(&self, zone: Zone) {
        self.zones.write().insert(zone.id.clone(), zone);
    }

    /// Current copy of a device
    pub fn device(&self, id: &DeviceId) -> Option<Device> {
        self.devices.read().get(id).cloned()
    }

    /// Change a capability value and notify listeners
    pub fn emit_capability(&self, id: &DeviceId, capability_id: &str, value: CapabilityValue) {
        if let Some(cap) = self
            .devices
            .write()
            .get_mut(id)
            .and_then(|d| d.capabilities_obj.get_mut(capability_id))
        {
            cap.value = value.clone();
        }

        let listeners: Vec<CapabilityListener> = self
            .listeners
            .lock()
            .get(&(id.clone(), capability_id.to_string()))
            .map(|l| l.iter().map(|(_, listener)| listener.clone()).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(value.clone());
        }
    }

    /// Successful writes, in order
    pub fn writes(&self) -> Vec<(DeviceId, String, CapabilityValue)> {
        self.writes.lock().clone()
    }

    /// Forget recorded writes
    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    /// Make every write to this capability fail
    pub fn fail_writes_for(&self, capability_id: &str) {
        self.failing_capabilities
            .lock()
            .insert(capability_id.to_string());
    }

    /// Whether writes are echoed back as capability changes (default on)
    pub fn set_echo_writes(&self, echo: bool) {
        self.echo_writes.store(echo, Ordering::SeqCst);
    }

    /// Make every write take this long before it lands
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }

    /// Live listeners for one capability
    pub fn listener_count(&self, id: &DeviceId, capability_id: &str) -> usize {
        self.listeners
            .lock()
            .get(&(id.clone(), capability_id.to_string()))
            .map_or(0, Vec::len)
    }

    /// Live listeners for one device
    pub fn device_listener_count(&self, id: &DeviceId) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|((device_id, _), _)| device_id == id)
            .map(|(_, l)| l.len())
            .sum()
    }

    /// Live listeners across all devices
    pub fn total_listeners(&self) -> usize {
        self.listeners.lock().values().map(Vec::len).sum()
    }

    /// Whether `connect` was called
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourcePlatform for MockSourcePlatform {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get_devices(&self) -> Result<HashMap<DeviceId, Device>> {
        Ok(self.devices.read().clone())
    }

    async fn get_drivers(&self) -> Result<HashMap<String, Driver>> {
        Ok(self.drivers.read().clone())
    }

    async fn get_zone(&self, device: &Device) -> Result<Option<Zone>> {
        Ok(device
            .zone_id
            .as_ref()
            .and_then(|id| self.zones.read().get(id).cloned()))
    }

    async fn set_capability_value(
        &self,
        device_id: &DeviceId,
        capability_id: &str,
        value: CapabilityValue,
    ) -> Result<()> {
        let delay = *self.write_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !self.devices.read().contains_key(device_id) {
            return Err(BridgeError::DeviceNotFound(device_id.clone()));
        }
        if self.failing_capabilities.lock().contains(capability_id) {
            return Err(BridgeError::Source(format!(
                "{capability_id} rejected the write"
            )));
        }
        self.writes
            .lock()
            .push((device_id.clone(), capability_id.to_string(), value.clone()));
        if self.echo_writes.load(Ordering::SeqCst) {
            self.emit_capability(device_id, capability_id, value);
        }
        Ok(())
    }

    async fn make_capability_instance(
        &self,
        device_id: &DeviceId,
        capability_id: &str,
        listener: CapabilityListener,
    ) -> Result<Box<dyn CapabilityInstance>> {
        if !self.devices.read().contains_key(device_id) {
            return Err(BridgeError::DeviceNotFound(device_id.clone()));
        }
        let id = self.next_instance.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .entry((device_id.clone(), capability_id.to_string()))
            .or_default()
            .push((id, listener));
        Ok(Box::new(MockCapabilityInstance {
            id,
            device_id: device_id.clone(),
            capability_id: capability_id.to_string(),
            listeners: self.listeners.clone(),
        }))
    }

    fn subscribe_events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }
}

struct MockCapabilityInstance {
    id: u64,
    device_id: DeviceId,
    capability_id: String,
    listeners: Arc<Mutex<ListenerMap>>,
}

#[async_trait]
impl CapabilityInstance for MockCapabilityInstance {
    fn capability_id(&self) -> &str {
        &self.capability_id
    }

    async fn destroy(&self) -> Result<()> {
        let mut listeners = self.listeners.lock();
        let key = (self.device_id.clone(), self.capability_id.clone());
        let Some(entries) = listeners.get_mut(&key) else {
            return Err(BridgeError::DeviceNotFound(self.device_id.clone()));
        };
        entries.retain(|(id, _)| *id != self.id);
        if entries.is_empty() {
            listeners.remove(&key);
        }
        Ok(())
    }
}

// ============================================================================
// Protocol gateway
// ============================================================================

struct MockEndpoint {
    descriptor: EndpointDescriptor,
    attributes: AttributeSnapshot,
    commands: mpsc::Sender<InboundCommand>,
}

/// In-memory protocol gateway
pub struct MockGateway {
    endpoints: Mutex<BTreeMap<EndpointId, MockEndpoint>>,
    patches: Mutex<Vec<(EndpointId, AttributeSnapshot)>>,
    failing_adds: Mutex<HashSet<EndpointId>>,
    state: Mutex<GatewayState>,
    commissioned: AtomicBool,
    command_buffer: AtomicUsize,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Create a gateway with no endpoints
    pub fn new() -> Self {
        Self {
            endpoints: Mutex::new(BTreeMap::new()),
            patches: Mutex::new(Vec::new()),
            failing_adds: Mutex::new(HashSet::new()),
            state: Mutex::new(GatewayState::Created),
            commissioned: AtomicBool::new(false),
            command_buffer: AtomicUsize::new(16),
        }
    }

    /// Register an endpoint without going through the async trait
    pub fn add_endpoint_sync(&self, descriptor: EndpointDescriptor) -> Result<EndpointRegistration> {
        if self.failing_adds.lock().contains(&descriptor.id) {
            return Err(BridgeError::Gateway(format!(
                "endpoint {} rejected",
                descriptor.id
            )));
        }
        let mut endpoints = self.endpoints.lock();
        if endpoints.contains_key(&descriptor.id) {
            return Err(BridgeError::Gateway(format!(
                "endpoint {} already exists",
                descriptor.id
            )));
        }
        let (tx, rx) = mpsc::channel(self.command_buffer());
        let id = descriptor.id.clone();
        endpoints.insert(
            id.clone(),
            MockEndpoint {
                attributes: descriptor.attributes.clone(),
                descriptor,
                commands: tx,
            },
        );
        Ok(EndpointRegistration { id, commands: rx })
    }

    /// Capacity of command channels for endpoints added from now on
    pub fn set_command_buffer(&self, capacity: usize) {
        self.command_buffer.store(capacity.max(1), Ordering::SeqCst);
    }

    /// Capacity of new command channels
    pub fn command_buffer(&self) -> usize {
        self.command_buffer.load(Ordering::SeqCst)
    }

    /// Make adding this endpoint fail
    pub fn fail_add_for(&self, id: &EndpointId) {
        self.failing_adds.lock().insert(id.clone());
    }

    /// Mark the node commissioned or not
    pub fn set_commissioned(&self, commissioned: bool) {
        self.commissioned.store(commissioned, Ordering::SeqCst);
    }

    /// Ids of registered endpoints
    pub fn endpoint_ids(&self) -> Vec<EndpointId> {
        self.endpoints.lock().keys().cloned().collect()
    }

    /// Number of registered endpoints
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.lock().len()
    }

    /// Check whether an endpoint is registered
    pub fn has_endpoint(&self, id: &EndpointId) -> bool {
        self.endpoints.lock().contains_key(id)
    }

    /// Descriptor an endpoint was registered with
    pub fn descriptor(&self, id: &EndpointId) -> Option<EndpointDescriptor> {
        self.endpoints.lock().get(id).map(|e| e.descriptor.clone())
    }

    /// Current attributes of an endpoint (initial values plus patches)
    pub fn attributes(&self, id: &EndpointId) -> Option<AttributeSnapshot> {
        self.endpoints.lock().get(id).map(|e| e.attributes.clone())
    }

    /// Patches applied to an endpoint, in order
    pub fn patches_for(&self, id: &EndpointId) -> Vec<AttributeSnapshot> {
        self.patches
            .lock()
            .iter()
            .filter(|(endpoint, _)| endpoint == id)
            .map(|(_, patch)| patch.clone())
            .collect()
    }

    /// Invoke a command on an endpoint as a controller would
    pub fn send_command(&self, id: &EndpointId, command: InboundCommand) -> bool {
        self.endpoints
            .lock()
            .get(id)
            .is_some_and(|e| e.commands.try_send(command).is_ok())
    }
}

#[async_trait]
impl ProtocolGateway for MockGateway {
    async fn start(&self) -> Result<()> {
        *self.state.lock() = GatewayState::Online;
        Ok(())
    }

    async fn add_endpoint(&self, endpoint: EndpointDescriptor) -> Result<EndpointRegistration> {
        self.add_endpoint_sync(endpoint)
    }

    async fn remove_endpoint(&self, id: &EndpointId) -> Result<()> {
        self.endpoints
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BridgeError::EndpointNotFound(id.clone()))
    }

    async fn set_attributes(&self, id: &EndpointId, patch: AttributeSnapshot) -> Result<()> {
        let mut endpoints = self.endpoints.lock();
        let endpoint = endpoints
            .get_mut(id)
            .ok_or_else(|| BridgeError::EndpointNotFound(id.clone()))?;
        endpoint.attributes.merge(&patch);
        self.patches.lock().push((id.clone(), patch));
        Ok(())
    }

    fn commissioning_status(&self) -> CommissioningStatus {
        CommissioningStatus {
            commissioned: self.commissioned.load(Ordering::SeqCst),
            qr_pairing_code: TEST_QR_PAIRING_CODE.to_string(),
            manual_pairing_code: TEST_MANUAL_PAIRING_CODE.to_string(),
        }
    }

    fn state(&self) -> GatewayState {
        *self.state.lock()
    }

    async fn shutdown(&self) -> Result<()> {
        self.endpoints.lock().clear();
        *self.state.lock() = GatewayState::Offline;
        Ok(())
    }
}

/// Factory handing out one shared [`MockGateway`]
pub struct MockGatewayFactory {
    gateway: Arc<MockGateway>,
    fail: AtomicBool,
    created: AtomicUsize,
    options: Mutex<Option<ServerNodeOptions>>,
}

impl MockGatewayFactory {
    /// Create a factory around a gateway
    pub fn new(gateway: Arc<MockGateway>) -> Self {
        Self {
            gateway,
            fail: AtomicBool::new(false),
            created: AtomicUsize::new(0),
            options: Mutex::new(None),
        }
    }

    /// Make creation fail, as when the port is taken
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of successful creations
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Options passed to the last creation
    pub fn last_options(&self) -> Option<ServerNodeOptions> {
        self.options.lock().clone()
    }
}

#[async_trait]
impl GatewayFactory for MockGatewayFactory {
    async fn create(&self, options: &ServerNodeOptions) -> Result<Arc<dyn ProtocolGateway>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::GatewayCreation(format!(
                "port {} already in use",
                options.network_port
            )));
        }
        self.gateway.set_command_buffer(options.command_buffer);
        *self.options.lock() = Some(options.clone());
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.gateway.clone())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// A `light` device with `onoff` and `dim`
pub fn dimmable_light(id: &str, on: bool, dim: f64) -> Device {
    Device::new(id, format!("Dimmable {id}"), "light")
        .with_capability(Capability::new("onoff", on))
        .with_capability(Capability::new("dim", dim).with_range(0.0, 1.0))
}

/// A `light` device with only `onoff`
pub fn on_off_light(id: &str, on: bool) -> Device {
    Device::new(id, format!("Light {id}"), "light").with_capability(Capability::new("onoff", on))
}

/// A `light` device with hue, saturation, temperature and mode
pub fn color_light(id: &str) -> Device {
    Device::new(id, format!("Color {id}"), "light")
        .with_capability(Capability::new("onoff", true))
        .with_capability(Capability::new("dim", 1.0))
        .with_capability(Capability::new("light_hue", 0.5))
        .with_capability(Capability::new("light_saturation", 1.0))
        .with_capability(Capability::new("light_temperature", 0.5))
        .with_capability(Capability::new("light_mode", "color"))
}

/// A `light` with both color modes but no `light_mode`
pub fn color_light_without_mode(id: &str) -> Device {
    Device::new(id, format!("Color {id}"), "light")
        .with_capability(Capability::new("onoff", true))
        .with_capability(Capability::new("dim", 1.0))
        .with_capability(Capability::new("light_hue", 0.5))
        .with_capability(Capability::new("light_saturation", 1.0))
        .with_capability(Capability::new("light_temperature", 0.5))
}

/// A `speaker`, which no rule maps
pub fn unsupported_device(id: &str) -> Device {
    Device::new(id, format!("Speaker {id}"), "speaker")
        .with_capability(Capability::new("volume_set", 0.4))
}

/// Configuration with short timeouts for tests
pub fn test_config() -> BridgeConfig {
    BridgeConfigBuilder::new()
        .unique_id("test-hub")
        .operation_timeout(Duration::from_secs(2))
        .build()
}

/// A bridge manager wired to mocks
pub struct TestBridge {
    /// The manager under test
    pub manager: Arc<BridgeManager>,
    /// Source platform mock
    pub platform: Arc<MockSourcePlatform>,
    /// Gateway mock
    pub gateway: Arc<MockGateway>,
    /// Gateway factory mock
    pub factory: Arc<MockGatewayFactory>,
    /// Settings store
    pub settings: Arc<MemorySettings>,
}

impl TestBridge {
    /// Wire a manager to mocks seeded with `devices`
    pub fn new(devices: Vec<Device>) -> Self {
        Self::with_settings(devices, MemorySettings::new())
    }

    /// Wire a manager with pre-populated settings
    pub fn with_settings(devices: Vec<Device>, settings: MemorySettings) -> Self {
        let platform = Arc::new(MockSourcePlatform::new());
        for device in devices {
            platform.add_device(device);
        }
        let gateway = Arc::new(MockGateway::new());
        let factory = Arc::new(MockGatewayFactory::new(gateway.clone()));
        let settings = Arc::new(settings);
        let manager = Arc::new(BridgeManager::new(
            test_config(),
            platform.clone(),
            factory.clone(),
            settings.clone(),
        ));
        Self {
            manager,
            platform,
            gateway,
            factory,
            settings,
        }
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

/// Install a test subscriber honoring `RUST_LOG`
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
