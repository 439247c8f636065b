//! Persisted enabled-device set
//!
//! The set of device ids the user chose to expose survives restarts. It is
//! stored as a JSON array of strings under a single settings key.

use async_trait::async_trait;
use capbridge_core::DeviceId;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use crate::error::Result;

/// Key/value settings storage
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a value; `None` when the key was never written
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Write a value
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;
}

/// In-memory settings store
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemorySettings {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one value
    pub fn with_value(key: impl Into<String>, value: serde_json::Value) -> Self {
        let store = Self::new();
        store.values.write().insert(key.into(), value);
        store
    }

    /// Read a value without going through the async trait
    pub fn snapshot(&self, key: &str) -> Option<serde_json::Value> {
        self.values.read().get(key).cloned()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// The set of device ids the user selected for bridging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnabledDeviceSet {
    ids: BTreeSet<DeviceId>,
}

impl EnabledDeviceSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from settings
    ///
    /// A missing key is an empty set. A value that is not an array of
    /// strings is logged and treated as empty.
    pub async fn load(store: &dyn SettingsStore, key: &str) -> Result<Self> {
        let Some(value) = store.get(key).await? else {
            return Ok(Self::new());
        };
        match serde_json::from_value::<Vec<DeviceId>>(value) {
            Ok(ids) => Ok(ids.into_iter().collect()),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring malformed enabled device set");
                Ok(Self::new())
            }
        }
    }

    /// Write to settings
    pub async fn persist(&self, store: &dyn SettingsStore, key: &str) -> Result<()> {
        store.set(key, serde_json::to_value(&self.ids)?).await
    }

    /// Check membership
    pub fn contains(&self, id: &DeviceId) -> bool {
        self.ids.contains(id)
    }

    /// Add an id; returns `false` if it was already present
    pub fn insert(&mut self, id: DeviceId) -> bool {
        self.ids.insert(id)
    }

    /// Remove an id; returns `false` if it was absent
    pub fn remove(&mut self, id: &DeviceId) -> bool {
        self.ids.remove(id)
    }

    /// Iterate ids in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &DeviceId> {
        self.ids.iter()
    }

    /// Number of ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check for an empty set
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<DeviceId> for EnabledDeviceSet {
    fn from_iter<T: IntoIterator<Item = DeviceId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
