//! Per-device adapter over the source platform
//!
//! Wraps one source device: owns its capability subscriptions and bounds
//! every write with the configured timeout. A device has at most one live
//! subscription per capability.

use capbridge_core::{CapabilityValue, DeviceId};
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{BridgeError, Result};
use crate::source::{CapabilityInstance, CapabilityListener, SourcePlatform};
use crate::task::bounded;

/// Identifies one (device, capability) subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    /// Device
    pub device_id: DeviceId,
    /// Capability
    pub capability_id: String,
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device_id, self.capability_id)
    }
}

/// Adapter for one source device
pub struct DeviceAdapter {
    device_id: DeviceId,
    platform: Arc<dyn SourcePlatform>,
    subscriptions: Mutex<HashMap<String, Arc<dyn CapabilityInstance>>>,
    timeout: Duration,
}

impl fmt::Debug for DeviceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceAdapter")
            .field("device_id", &self.device_id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DeviceAdapter {
    /// Create an adapter
    pub fn new(device_id: DeviceId, platform: Arc<dyn SourcePlatform>, timeout: Duration) -> Self {
        Self {
            device_id,
            platform,
            subscriptions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Device this adapter wraps
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    fn key(&self, capability_id: &str) -> SubscriptionKey {
        SubscriptionKey {
            device_id: self.device_id.clone(),
            capability_id: capability_id.to_string(),
        }
    }

    /// Subscribe to a capability unless already subscribed
    ///
    /// A second call for the same capability is a no-op and keeps the
    /// first listener.
    pub async fn ensure_subscribed(
        &self,
        capability_id: &str,
        listener: CapabilityListener,
    ) -> Result<SubscriptionKey> {
        let mut subscriptions = self.subscriptions.lock().await;
        if subscriptions.contains_key(capability_id) {
            trace!(device_id = %self.device_id, capability = %capability_id, "Already subscribed");
            return Ok(self.key(capability_id));
        }

        let instance = bounded(
            "make_capability_instance",
            self.timeout,
            self.platform
                .make_capability_instance(&self.device_id, capability_id, listener),
        )
        .await?;
        subscriptions.insert(capability_id.to_string(), Arc::from(instance));

        debug!(device_id = %self.device_id, capability = %capability_id, "Subscribed to capability");
        Ok(self.key(capability_id))
    }

    /// Drop one subscription; returns whether one existed
    pub async fn unsubscribe(&self, capability_id: &str) -> bool {
        let instance = self.subscriptions.lock().await.remove(capability_id);
        match instance {
            Some(instance) => {
                self.destroy(instance).await;
                true
            }
            None => false,
        }
    }

    /// Drop every subscription; returns how many were released
    ///
    /// Never fails: a device that is already gone counts as unsubscribed.
    pub async fn release_all(&self) -> usize {
        let drained: Vec<_> = self.subscriptions.lock().await.drain().map(|(_, i)| i).collect();
        let count = drained.len();
        join_all(drained.into_iter().map(|instance| self.destroy(instance))).await;
        debug!(device_id = %self.device_id, released = count, "Released capability subscriptions");
        count
    }

    async fn destroy(&self, instance: Arc<dyn CapabilityInstance>) {
        match bounded("destroy_capability_instance", self.timeout, instance.destroy()).await {
            Ok(()) => {}
            Err(BridgeError::DeviceNotFound(_)) => {
                trace!(
                    device_id = %self.device_id,
                    capability = %instance.capability_id(),
                    "Device already removed, subscription gone"
                );
            }
            Err(e) => {
                warn!(
                    device_id = %self.device_id,
                    capability = %instance.capability_id(),
                    error = %e,
                    "Failed to destroy capability instance"
                );
            }
        }
    }

    /// Number of live subscriptions
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    /// Check whether a capability is subscribed
    pub async fn is_subscribed(&self, capability_id: &str) -> bool {
        self.subscriptions.lock().await.contains_key(capability_id)
    }

    /// Write a capability value on the source device
    pub async fn set_capability_value(&self, capability_id: &str, value: CapabilityValue) -> Result<()> {
        trace!(device_id = %self.device_id, capability = %capability_id, value = %value, "Writing capability");
        bounded(
            "set_capability_value",
            self.timeout,
            self.platform
                .set_capability_value(&self.device_id, capability_id, value.clone()),
        )
        .await
        .map_err(|e| match e {
            e @ BridgeError::CapabilityWriteFailure { .. } => e,
            other => BridgeError::CapabilityWriteFailure {
                device_id: self.device_id.clone(),
                capability_id: capability_id.to_string(),
                value,
                reason: other.to_string(),
            },
        })
    }
}
