//! Bridge manager
//!
//! The manager owns the protocol gateway, the catalog of source devices, the
//! persisted set of enabled devices and one [`BridgeEntry`] per bridged
//! device. Enable, disable and device-removal for the same device are
//! serialized by a per-device lock; different devices proceed concurrently.
//!
//! ```text
//!   enable_device ──► synthesize ──► add_endpoint ──► subscribe ──► Active
//!                                                                     │
//!   capability change ──► update pump ──► forward ──► set_attributes ◄┘
//!   controller command ──► command pump ──► reverse ──► set_capability_value
//! ```

use capbridge_core::{CapabilityValue, Device, DeviceId, DeviceType, Driver, InboundCommand};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapter::DeviceAdapter;
use crate::config::BridgeConfig;
use crate::entry::{BridgeEntry, EntryInfo};
use crate::error::{BridgeError, Result};
use crate::gateway::{basic_information, EndpointDescriptor, GatewayFactory, GatewayState, ProtocolGateway};
use crate::mapper::MapperRegistry;
use crate::settings::{EnabledDeviceSet, SettingsStore};
use crate::source::{CapabilityListener, DeviceEvent, SourcePlatform};
use crate::stats::{BridgeStats, StatsRecorder};
use crate::task::{bounded, isolated, spawn_isolated};

/// Bridge readiness and commissioning information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeState {
    /// The gateway is started and serving
    pub ready: bool,
    /// At least one controller has commissioned the bridge
    pub commissioned: bool,
    /// QR setup payload
    pub qr_pairing_code: Option<String>,
    /// Manual pairing code
    pub manual_pairing_code: Option<String>,
}

/// Catalog entry as shown to the settings UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    /// Device id
    pub id: DeviceId,
    /// Display name
    pub name: String,
    /// Effective device class
    pub class: String,
    /// Zone name, if the zone could be resolved
    pub zone_name: Option<String>,
    /// Device icon, falling back to the driver's
    pub icon_url: Option<String>,
    /// The user enabled this device for bridging
    pub is_selected: bool,
    /// A live endpoint exists for this device
    pub is_bridged: bool,
    /// Device type a mapping rule would produce, if any
    pub device_type: Option<DeviceType>,
}

#[derive(Debug, Default)]
struct Catalog {
    devices: HashMap<DeviceId, Device>,
    drivers: HashMap<String, Driver>,
}

/// Owns the gateway and every bridged device
pub struct BridgeManager {
    config: BridgeConfig,
    platform: Arc<dyn SourcePlatform>,
    factory: Arc<dyn GatewayFactory>,
    settings: Arc<dyn SettingsStore>,
    registry: MapperRegistry,
    gateway: RwLock<Option<Arc<dyn ProtocolGateway>>>,
    started: AtomicBool,
    catalog: RwLock<Catalog>,
    enabled: AsyncMutex<EnabledDeviceSet>,
    entries: RwLock<HashMap<DeviceId, Arc<BridgeEntry>>>,
    device_locks: Mutex<HashMap<DeviceId, Arc<AsyncMutex<()>>>>,
    stats: Arc<StatsRecorder>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl BridgeManager {
    /// Create a manager; nothing runs until [`start`](Self::start)
    pub fn new(
        config: BridgeConfig,
        platform: Arc<dyn SourcePlatform>,
        factory: Arc<dyn GatewayFactory>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            config,
            platform,
            factory,
            settings,
            registry: MapperRegistry::new(),
            gateway: RwLock::new(None),
            started: AtomicBool::new(false),
            catalog: RwLock::new(Catalog::default()),
            enabled: AsyncMutex::new(EnabledDeviceSet::new()),
            entries: RwLock::new(HashMap::new()),
            device_locks: Mutex::new(HashMap::new()),
            stats: Arc::new(StatsRecorder::new()),
            watcher: Mutex::new(None),
        }
    }

    /// Replace the mapping rules
    pub fn with_registry(mut self, registry: MapperRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Mapping rules in use
    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    /// Check whether the gateway is running
    pub fn is_started(&self) -> bool {
        self.gateway.read().is_some()
    }

    fn gateway(&self) -> Option<Arc<dyn ProtocolGateway>> {
        self.gateway.read().clone()
    }

    fn timeout(&self) -> Duration {
        self.config.runtime.operation_timeout
    }

    fn settings_key(&self) -> &str {
        &self.config.runtime.settings_key
    }

    fn device_lock(&self, id: &DeviceId) -> Arc<AsyncMutex<()>> {
        self.device_locks
            .lock()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drop the map's lock for `id` once `lock` is its last other holder
    fn release_device_lock(&self, id: &DeviceId, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.device_locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(id);
        }
    }

    #[cfg(test)]
    fn device_lock_count(&self) -> usize {
        self.device_locks.lock().len()
    }

    // ========================================================================
    // Startup and shutdown
    // ========================================================================

    /// Start the gateway and bring up every persisted device
    ///
    /// Devices that fail to initialize are logged and rolled back to
    /// disabled. Enabled devices missing from the platform stay enabled
    /// and are bridged when they appear.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::AlreadyStarted);
        }

        match self.start_inner().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(error = %e, code = e.error_code(), "Bridge failed to start");
                let watcher = self.watcher.lock().take();
                if let Some(handle) = watcher {
                    handle.abort();
                }
                *self.gateway.write() = None;
                self.started.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn start_inner(self: &Arc<Self>) -> Result<()> {
        self.config.validate()?;
        let timeout = self.timeout();
        let options = self.config.node_options();
        info!(
            node_id = %options.id,
            port = options.network_port,
            discriminator = options.discriminator,
            "Starting bridge"
        );

        let gateway = bounded("create_gateway", timeout, self.factory.create(&options))
            .await
            .map_err(|e| match e {
                e @ BridgeError::GatewayCreation(_) => e,
                other => BridgeError::GatewayCreation(other.to_string()),
            })?;
        bounded("start_gateway", timeout, gateway.start())
            .await
            .map_err(|e| BridgeError::GatewayCreation(e.to_string()))?;

        if let Err(e) = self.load_and_restore(&gateway).await {
            if let Err(shutdown_err) = gateway.shutdown().await {
                warn!(error = %shutdown_err, "Gateway shutdown after failed start also failed");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn load_and_restore(self: &Arc<Self>, gateway: &Arc<dyn ProtocolGateway>) -> Result<()> {
        let timeout = self.timeout();
        bounded("connect", timeout, self.platform.connect()).await?;
        let devices = bounded("get_devices", timeout, self.platform.get_devices()).await?;
        let drivers = match bounded("get_drivers", timeout, self.platform.get_drivers()).await {
            Ok(drivers) => drivers,
            Err(e) => {
                warn!(error = %e, "Failed to load drivers, icons fall back to device icons only");
                HashMap::new()
            }
        };
        let device_count = devices.len();
        *self.catalog.write() = Catalog { devices, drivers };

        let enabled = EnabledDeviceSet::load(self.settings.as_ref(), self.settings_key()).await?;
        let ids: Vec<DeviceId> = enabled.iter().cloned().collect();
        *self.enabled.lock().await = enabled;
        *self.gateway.write() = Some(gateway.clone());

        let events = self.platform.subscribe_events();
        *self.watcher.lock() = Some(self.spawn_event_watcher(events));

        join_all(ids.iter().map(|id| self.restore_device(gateway, id))).await;

        info!(
            devices = device_count,
            enabled = ids.len(),
            bridged = self.entry_count(),
            "Bridge started"
        );
        Ok(())
    }

    async fn restore_device(&self, gateway: &Arc<dyn ProtocolGateway>, id: &DeviceId) {
        let lock = self.device_lock(id);
        let _guard = lock.lock().await;

        let device = self.catalog.read().devices.get(id).cloned();
        let Some(device) = device else {
            warn!(device_id = %id, "Enabled device is missing from the source platform");
            return;
        };
        self.recover_device(gateway, &device).await;
    }

    /// Bring up an enabled device that has no entry yet
    ///
    /// On failure the device is rolled back to disabled. Callers hold the
    /// device lock.
    async fn recover_device(&self, gateway: &Arc<dyn ProtocolGateway>, device: &Device) {
        if let Err(e) = self.initialize_entry(gateway, device).await {
            warn!(device_id = %device.id, error = %e, "Failed to bridge enabled device, disabling it");
            self.forget_enabled(&device.id).await;
        }
    }

    async fn forget_enabled(&self, id: &DeviceId) {
        let mut enabled = self.enabled.lock().await;
        enabled.remove(id);
        if let Err(e) = enabled.persist(self.settings.as_ref(), self.settings_key()).await {
            warn!(device_id = %id, error = %e, "Failed to persist enabled set after rollback");
        }
    }

    /// Tear down every entry and stop the gateway
    ///
    /// The enabled set is left untouched so the next start restores it.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(gateway) = self.gateway() else {
            debug!("Shutdown requested but bridge is not started");
            return Ok(());
        };
        info!("Shutting down bridge");

        let watcher = self.watcher.lock().take();
        if let Some(handle) = watcher {
            handle.abort();
        }

        let entries: Vec<_> = self.entries.read().values().cloned().collect();
        let gateway_ref = &gateway;
        join_all(entries.iter().map(|entry| async move {
            let lock = self.device_lock(entry.device_id());
            let _guard = lock.lock().await;
            self.uninitialize_entry(gateway_ref, entry).await;
        }))
        .await;

        if let Err(e) = bounded("shutdown_gateway", self.timeout(), gateway.shutdown()).await {
            warn!(error = %e, "Gateway shutdown failed");
        }
        *self.gateway.write() = None;
        self.started.store(false, Ordering::SeqCst);

        info!(released = entries.len(), "Bridge stopped");
        Ok(())
    }

    // ========================================================================
    // Enable / disable
    // ========================================================================

    /// Bridge a device and remember the choice
    ///
    /// A no-op before the bridge is started or when the device is already
    /// enabled. A device no rule supports stays enabled without an
    /// endpoint.
    pub async fn enable_device(&self, id: &DeviceId) -> Result<()> {
        let Some(gateway) = self.gateway() else {
            debug!(device_id = %id, "Bridge not started, ignoring enable");
            return Ok(());
        };

        let lock = self.device_lock(id);
        let _guard = lock.lock().await;

        let device = self.catalog.read().devices.get(id).cloned();
        let device = device.ok_or_else(|| BridgeError::DeviceNotFound(id.clone()))?;

        let already_enabled = self.enabled.lock().await.contains(id);
        if already_enabled {
            // Unsupported devices stay enabled without an entry
            if self.entry(id).is_some() || self.registry.select(&device).is_none() {
                debug!(device_id = %id, "Device already enabled");
                return Ok(());
            }
            info!(device_id = %id, "Enabled device has no endpoint, bridging it");
        } else {
            let mut enabled = self.enabled.lock().await;
            enabled.insert(id.clone());
            if let Err(e) = enabled.persist(self.settings.as_ref(), self.settings_key()).await {
                enabled.remove(id);
                return Err(e);
            }
        }

        if let Err(e) = self.initialize_entry(&gateway, &device).await {
            self.forget_enabled(id).await;
            return Err(e);
        }
        Ok(())
    }

    /// Unbridge a device and forget the choice
    pub async fn disable_device(&self, id: &DeviceId) -> Result<()> {
        let Some(gateway) = self.gateway() else {
            debug!(device_id = %id, "Bridge not started, ignoring disable");
            return Ok(());
        };

        let lock = self.device_lock(id);
        let result = {
            let _guard = lock.lock().await;
            self.disable_locked(&gateway, id).await
        };
        self.release_device_lock(id, lock);
        result
    }

    async fn disable_locked(&self, gateway: &Arc<dyn ProtocolGateway>, id: &DeviceId) -> Result<()> {
        {
            let mut enabled = self.enabled.lock().await;
            if !enabled.contains(id) {
                let known = self.catalog.read().devices.contains_key(id);
                return if known {
                    debug!(device_id = %id, "Device already disabled");
                    Ok(())
                } else {
                    Err(BridgeError::DeviceNotFound(id.clone()))
                };
            }
            enabled.remove(id);
            if let Err(e) = enabled.persist(self.settings.as_ref(), self.settings_key()).await {
                enabled.insert(id.clone());
                return Err(e);
            }
        }

        let entry = self.entries.read().get(id).cloned();
        if let Some(entry) = entry {
            self.uninitialize_entry(gateway, &entry).await;
        }
        Ok(())
    }

    // ========================================================================
    // Entry lifecycle
    // ========================================================================

    async fn initialize_entry(&self, gateway: &Arc<dyn ProtocolGateway>, device: &Device) -> Result<()> {
        let Some(synthesis) = self.registry.synthesize(device) else {
            info!(
                device_id = %device.id,
                class = %device.effective_class(),
                "No endpoint mapping for device, leaving it unbridged"
            );
            self.stats.record(|s| s.unsupported_devices += 1);
            return Ok(());
        };

        let adapter = Arc::new(DeviceAdapter::new(
            device.id.clone(),
            self.platform.clone(),
            self.timeout(),
        ));
        let entry = Arc::new(BridgeEntry::new(device, synthesis, adapter));
        self.entries.write().insert(device.id.clone(), entry.clone());

        match self.bring_up(gateway, &entry, device).await {
            Ok(()) => {
                info!(
                    device_id = %device.id,
                    device_type = %entry.shape().device_type,
                    rule = entry.rule(),
                    "Device bridged"
                );
                Ok(())
            }
            Err(e) => {
                error!(device_id = %device.id, error = %e, "Failed to bridge device");
                self.uninitialize_entry(gateway, &entry).await;
                self.stats.record(|s| s.synthesis_failures += 1);
                Err(match e {
                    e @ BridgeError::SynthesisFailure { .. } => e,
                    other => BridgeError::SynthesisFailure {
                        device_id: device.id.clone(),
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    async fn bring_up(
        &self,
        gateway: &Arc<dyn ProtocolGateway>,
        entry: &Arc<BridgeEntry>,
        device: &Device,
    ) -> Result<()> {
        let timeout = self.timeout();
        let descriptor = EndpointDescriptor::bridged(device, entry.shape());
        let registration = bounded("add_endpoint", timeout, gateway.add_endpoint(descriptor)).await?;
        entry.mark_registered();

        // Listeners run on the platform's dispatcher, so they only enqueue.
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        for capability_id in entry.table().capability_ids() {
            let tx = updates_tx.clone();
            let capability = capability_id.clone();
            let listener: CapabilityListener = Arc::new(move |value: CapabilityValue| {
                let _ = tx.send((capability.clone(), value));
            });
            entry.adapter().ensure_subscribed(&capability_id, listener).await?;
        }
        drop(updates_tx);

        entry.attach_task(self.spawn_update_pump(entry, gateway.clone(), updates_rx));
        entry.attach_task(self.spawn_command_pump(entry, registration.commands));

        entry.activate(gateway.as_ref(), timeout, &self.stats).await
    }

    async fn uninitialize_entry(&self, gateway: &Arc<dyn ProtocolGateway>, entry: &Arc<BridgeEntry>) {
        entry.begin_teardown().await;
        let released = entry.adapter().release_all().await;

        if entry.is_registered() {
            if let Err(e) = bounded(
                "remove_endpoint",
                self.timeout(),
                gateway.remove_endpoint(entry.endpoint_id()),
            )
            .await
            {
                warn!(device_id = %entry.device_id(), error = %e, "Failed to remove endpoint");
            }
        }

        self.entries.write().remove(entry.device_id());
        info!(device_id = %entry.device_id(), released, "Device unbridged");
    }

    fn spawn_update_pump(
        &self,
        entry: &Arc<BridgeEntry>,
        gateway: Arc<dyn ProtocolGateway>,
        mut updates: mpsc::UnboundedReceiver<(String, CapabilityValue)>,
    ) -> JoinHandle<()> {
        let entry = Arc::downgrade(entry);
        let stats = self.stats.clone();
        let timeout = self.timeout();

        tokio::spawn(async move {
            while let Some((capability_id, value)) = updates.recv().await {
                let Some(entry) = entry.upgrade() else { break };
                let device_id = entry.device_id().to_string();
                let update = async {
                    entry
                        .apply_capability_change(gateway.as_ref(), &capability_id, value, timeout, &stats)
                        .await
                        .map_err(|e| BridgeError::SubscriptionCallbackFailure {
                            device_id: entry.device_id().clone(),
                            capability_id: capability_id.clone(),
                            reason: e.to_string(),
                        })
                };
                isolated("capability update", &device_id, &stats, update).await;
            }
        })
    }

    fn spawn_command_pump(
        &self,
        entry: &Arc<BridgeEntry>,
        mut commands: mpsc::Receiver<InboundCommand>,
    ) -> JoinHandle<()> {
        let weak: Weak<BridgeEntry> = Arc::downgrade(entry);
        let handler = Arc::new(entry.handler(self.stats.clone()));
        let stats = self.stats.clone();

        tokio::spawn(async move {
            while let Some(command) = commands.recv().await {
                stats.record(|s| s.commands_received += 1);
                let Some(entry) = weak.upgrade() else { break };

                let handler = handler.clone();
                let command_stats = stats.clone();
                spawn_isolated(
                    "inbound command",
                    entry.device_id().to_string(),
                    stats.clone(),
                    async move {
                        match entry.handle_command(&handler, command).await {
                            Ok(true) => Ok(()),
                            Ok(false) => {
                                debug!(device_id = %entry.device_id(), command = ?command, "Dropping command for inactive entry");
                                Ok(())
                            }
                            Err(e) => {
                                command_stats.record(|s| s.command_errors += 1);
                                Err(e)
                            }
                        }
                    },
                );
            }
        })
    }

    // ========================================================================
    // Platform events
    // ========================================================================

    fn spawn_event_watcher(self: &Arc<Self>, mut events: broadcast::Receiver<DeviceEvent>) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(manager) = manager.upgrade() else { break };
                        manager.handle_device_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Device event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Device event watcher stopped");
        })
    }

    async fn handle_device_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Created(device) => {
                debug!(device_id = %device.id, name = %device.name, "Device added to catalog");
                self.catalog.write().devices.insert(device.id.clone(), device.clone());
                self.handle_device_created(device).await;
            }
            DeviceEvent::Updated(device) => self.handle_device_updated(device).await,
            DeviceEvent::Deleted(id) => {
                info!(device_id = %id, "Device removed from source platform");
                self.catalog.write().devices.remove(&id);
                let enabled = self.enabled.lock().await.contains(&id);
                if enabled {
                    if let Err(e) = self.disable_device(&id).await {
                        warn!(device_id = %id, error = %e, "Failed to unbridge removed device");
                    }
                }
            }
        }
    }

    async fn handle_device_created(&self, device: Device) {
        let Some(gateway) = self.gateway() else { return };
        let lock = self.device_lock(&device.id);
        let _guard = lock.lock().await;

        let enabled = self.enabled.lock().await.contains(&device.id);
        if !enabled || self.entry(&device.id).is_some() {
            return;
        }
        info!(device_id = %device.id, "Enabled device appeared, bridging it");
        self.recover_device(&gateway, &device).await;
    }

    async fn handle_device_updated(&self, device: Device) {
        let previous = self
            .catalog
            .write()
            .devices
            .insert(device.id.clone(), device.clone());

        let entry = self.entries.read().get(&device.id).cloned();
        let (Some(entry), Some(gateway)) = (entry, self.gateway()) else {
            return;
        };

        let identity_changed = previous
            .as_ref()
            .map_or(true, |p| p.name != device.name || p.available != device.available);
        if identity_changed {
            debug!(device_id = %device.id, reachable = device.available, "Updating bridged device information");
            if let Err(e) = entry
                .push_patch(gateway.as_ref(), basic_information(&device), self.timeout(), &self.stats)
                .await
            {
                warn!(device_id = %device.id, error = %e, "Failed to update bridged device information");
            }
        }

        if let Some(previous) = previous {
            if !previous.capability_ids().eq(device.capability_ids()) {
                info!(
                    device_id = %device.id,
                    "Capability set changed; disable and enable the device to rebuild its endpoint"
                );
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Readiness and pairing codes
    pub fn get_state(&self) -> BridgeState {
        match self.gateway() {
            Some(gateway) => {
                let status = gateway.commissioning_status();
                BridgeState {
                    ready: gateway.state() == GatewayState::Online,
                    commissioned: status.commissioned,
                    qr_pairing_code: Some(status.qr_pairing_code),
                    manual_pairing_code: Some(status.manual_pairing_code),
                }
            }
            None => BridgeState::default(),
        }
    }

    /// Every source device with its selection state, sorted by name
    ///
    /// Before start the catalog is read from the platform directly.
    pub async fn get_devices(&self) -> Result<Vec<DeviceSummary>> {
        let timeout = self.timeout();
        let (devices, drivers) = if self.is_started() {
            let catalog = self.catalog.read();
            (
                catalog.devices.values().cloned().collect::<Vec<_>>(),
                catalog.drivers.clone(),
            )
        } else {
            let devices = bounded("get_devices", timeout, self.platform.get_devices()).await?;
            let drivers = bounded("get_drivers", timeout, self.platform.get_drivers())
                .await
                .unwrap_or_default();
            (devices.into_values().collect(), drivers)
        };

        let enabled = self.enabled.lock().await.clone();
        let mut summaries = join_all(devices.iter().map(|device| {
            let drivers = &drivers;
            let enabled = &enabled;
            async move {
                let zone_name = match bounded("get_zone", timeout, self.platform.get_zone(device)).await {
                    Ok(zone) => zone.map(|z| z.name),
                    Err(e) => {
                        debug!(device_id = %device.id, error = %e, "Zone lookup failed");
                        None
                    }
                };
                let icon_url = device.icon_url.clone().or_else(|| {
                    device
                        .driver_id
                        .as_ref()
                        .and_then(|id| drivers.get(id))
                        .and_then(|d| d.icon_url.clone())
                });
                DeviceSummary {
                    id: device.id.clone(),
                    name: device.name.clone(),
                    class: device.effective_class().to_string(),
                    zone_name,
                    icon_url,
                    is_selected: enabled.contains(&device.id),
                    is_bridged: self.entries.read().contains_key(&device.id),
                    device_type: self.registry.select(device).map(|r| r.device_type),
                }
            }
        }))
        .await;

        summaries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    /// Check whether a device is in the enabled set
    pub async fn is_enabled(&self, id: &DeviceId) -> bool {
        self.enabled.lock().await.contains(id)
    }

    /// Ids in the enabled set
    pub async fn enabled_devices(&self) -> Vec<DeviceId> {
        self.enabled.lock().await.iter().cloned().collect()
    }

    /// Entry for a bridged device
    pub fn entry(&self, id: &DeviceId) -> Option<Arc<BridgeEntry>> {
        self.entries.read().get(id).cloned()
    }

    /// Number of bridged devices
    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Summaries of every bridged device
    pub async fn entries(&self) -> Vec<EntryInfo> {
        let entries: Vec<_> = self.entries.read().values().cloned().collect();
        let mut infos = join_all(entries.iter().map(|e| e.info())).await;
        infos.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        infos
    }

    /// Counters since creation
    pub fn stats(&self) -> BridgeStats {
        let mut stats = self.stats.snapshot();
        stats.active_endpoints = self.entry_count() as u64;
        stats
    }
}

impl std::fmt::Debug for BridgeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeManager")
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("entries", &self.entry_count())
            .finish_non_exhaustive()
    }
}
