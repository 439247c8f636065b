//! Source platform abstraction
//!
//! The home-automation platform owns the devices. The bridge reads the
//! catalog, writes capability values, and receives capability-change
//! callbacks through [`CapabilityInstance`] registrations.

use async_trait::async_trait;
use capbridge_core::{CapabilityValue, Device, DeviceId, Driver, Zone};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::Result;

/// Callback invoked by the platform when a subscribed capability changes
///
/// Called on the platform's dispatcher; implementations must not block.
pub type CapabilityListener = Arc<dyn Fn(CapabilityValue) + Send + Sync>;

/// A live capability subscription held by the platform
#[async_trait]
pub trait CapabilityInstance: Send + Sync {
    /// Capability this instance listens to
    fn capability_id(&self) -> &str;

    /// Stop delivering changes
    ///
    /// Returns [`BridgeError::DeviceNotFound`](crate::BridgeError::DeviceNotFound)
    /// when the device has already been removed; callers treat that as
    /// already unsubscribed.
    async fn destroy(&self) -> Result<()>;
}

/// Device lifecycle event from the platform
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A device was added
    Created(Device),
    /// A device's name, availability or capability set changed
    Updated(Device),
    /// A device was removed
    Deleted(DeviceId),
}

impl DeviceEvent {
    /// Id of the device the event is about
    pub fn device_id(&self) -> &DeviceId {
        match self {
            DeviceEvent::Created(device) | DeviceEvent::Updated(device) => &device.id,
            DeviceEvent::Deleted(id) => id,
        }
    }
}

/// Client for the source home-automation platform
#[async_trait]
pub trait SourcePlatform: Send + Sync {
    /// Establish the connection
    async fn connect(&self) -> Result<()>;

    /// Snapshot of all devices
    async fn get_devices(&self) -> Result<HashMap<DeviceId, Device>>;

    /// Snapshot of all drivers, keyed by driver id
    async fn get_drivers(&self) -> Result<HashMap<String, Driver>>;

    /// Zone a device lives in
    async fn get_zone(&self, device: &Device) -> Result<Option<Zone>>;

    /// Write a capability value
    async fn set_capability_value(
        &self,
        device_id: &DeviceId,
        capability_id: &str,
        value: CapabilityValue,
    ) -> Result<()>;

    /// Register a change listener for one capability of one device
    async fn make_capability_instance(
        &self,
        device_id: &DeviceId,
        capability_id: &str,
        listener: CapabilityListener,
    ) -> Result<Box<dyn CapabilityInstance>>;

    /// Subscribe to device lifecycle events
    fn subscribe_events(&self) -> broadcast::Receiver<DeviceEvent>;
}
