//! Source-platform device model
//!
//! A [`Device`] is owned by the home-automation platform; the bridge only
//! observes it. Each device carries a map of capability id to
//! [`Capability`], and it is this capability set that decides which
//! protocol endpoint gets synthesized for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ModelError, Result};

/// Opaque source-platform device identifier
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Create a new device id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The current value of a capability
///
/// `Null` is the platform's "unknown" state and must never be read as
/// zero or `false`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    /// Unknown / not yet reported
    #[default]
    Null,
    /// Boolean capability (`onoff`, `alarm_contact`, ...)
    Bool(bool),
    /// Numeric capability (`dim`, `measure_temperature`, ...)
    Number(f64),
    /// Enumerated or free-form string capability (`light_mode`, ...)
    Text(String),
}

impl CapabilityValue {
    /// Interpret a JSON value as a capability value
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Self::Number)
                .ok_or_else(|| ModelError::UnsupportedValue(n.to_string())),
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            other => Err(ModelError::UnsupportedValue(other.to_string())),
        }
    }

    /// Convert to a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Boolean view, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view, if this is a finite number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    /// String view, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Check for the unknown value
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for CapabilityValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for CapabilityValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for CapabilityValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl fmt::Display for CapabilityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Declared value type of a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityType {
    /// `true` / `false`
    #[default]
    Boolean,
    /// Number, optionally bounded by `min`/`max`
    Number,
    /// One of a fixed set of strings
    Enum,
    /// Free-form string
    String,
}

/// A named, typed property of a device
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    /// Capability id, e.g. `onoff`, `dim`, `light_hue`
    pub id: String,
    /// Declared type
    #[serde(rename = "type", default)]
    pub value_type: CapabilityType,
    /// Current value
    #[serde(default)]
    pub value: CapabilityValue,
    /// Lower bound for numbers
    #[serde(default)]
    pub min: Option<f64>,
    /// Upper bound for numbers
    #[serde(default)]
    pub max: Option<f64>,
    /// Allowed values for enums
    #[serde(default)]
    pub values: Vec<String>,
    /// Whether the value can be read
    #[serde(default = "default_true")]
    pub getable: bool,
    /// Whether the value can be written
    #[serde(default = "default_true")]
    pub setable: bool,
    /// When the value last changed
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Capability {
    /// Create a read-write capability with a value
    pub fn new(id: impl Into<String>, value: impl Into<CapabilityValue>) -> Self {
        let value = value.into();
        let value_type = match &value {
            CapabilityValue::Bool(_) | CapabilityValue::Null => CapabilityType::Boolean,
            CapabilityValue::Number(_) => CapabilityType::Number,
            CapabilityValue::Text(_) => CapabilityType::Enum,
        };
        Self {
            id: id.into(),
            value_type,
            value,
            getable: true,
            setable: true,
            ..Default::default()
        }
    }

    /// Mark as read-only
    pub fn read_only(mut self) -> Self {
        self.setable = false;
        self
    }

    /// Set numeric bounds
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Check if the capability can be written
    pub fn is_read_only(&self) -> bool {
        !self.setable
    }
}

/// A source-platform device
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Device id
    pub id: DeviceId,
    /// Display name
    pub name: String,
    /// Device class tag (`light`, `socket`, `sensor`, ...)
    pub class: String,
    /// Class override chosen by the user (e.g. a socket used as a light)
    #[serde(default)]
    pub virtual_class: Option<String>,
    /// Capabilities keyed by capability id
    #[serde(default)]
    pub capabilities_obj: BTreeMap<String, Capability>,
    /// Driver that created the device
    #[serde(default)]
    pub driver_id: Option<String>,
    /// Zone the device lives in
    #[serde(default)]
    pub zone_id: Option<String>,
    /// Device icon
    #[serde(default)]
    pub icon_url: Option<String>,
    /// Whether the device is currently reachable
    #[serde(default = "default_true")]
    pub available: bool,
}

impl Device {
    /// Create a device with no capabilities
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            class: class.into(),
            available: true,
            ..Default::default()
        }
    }

    /// Add a capability
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities_obj
            .insert(capability.id.clone(), capability);
        self
    }

    /// Set the virtual class
    pub fn with_virtual_class(mut self, class: impl Into<String>) -> Self {
        self.virtual_class = Some(class.into());
        self
    }

    /// The class used for mapping: the virtual class if set, else the class
    pub fn effective_class(&self) -> &str {
        self.virtual_class.as_deref().unwrap_or(&self.class)
    }

    /// Check whether a capability is present
    pub fn has_capability(&self, capability_id: &str) -> bool {
        self.capabilities_obj.contains_key(capability_id)
    }

    /// Check whether every listed capability is present
    pub fn has_all(&self, capability_ids: &[&str]) -> bool {
        capability_ids.iter().all(|id| self.has_capability(id))
    }

    /// Current value of a capability (`None` when the capability is absent)
    pub fn capability_value(&self, capability_id: &str) -> Option<&CapabilityValue> {
        self.capabilities_obj.get(capability_id).map(|c| &c.value)
    }

    /// Capability ids in sorted order
    pub fn capability_ids(&self) -> impl Iterator<Item = &str> {
        self.capabilities_obj.keys().map(String::as_str)
    }
}

/// A source-platform driver
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    /// Driver id
    pub id: String,
    /// Display name
    pub name: String,
    /// Driver icon, used when a device has none
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// A source-platform zone (room)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Zone {
    /// Zone id
    pub id: String,
    /// Display name
    pub name: String,
}
