//! Protocol-side endpoint model
//!
//! The foreign protocol exposes devices as endpoints. Each endpoint has a
//! device type and a fixed list of clusters, and each cluster holds typed
//! attributes and accepts commands. This module models the subset the
//! bridge synthesizes:
//!
//! | Device type | Clusters |
//! |-------------|----------|
//! | On/Off Light, On/Off Plug-in Unit | OnOff |
//! | Dimmable Light, Dimmable Plug-in Unit | OnOff, LevelControl |
//! | Color Temperature / Extended Color Light | OnOff, LevelControl, ColorControl |
//! | Temperature / Humidity / Contact / Occupancy Sensor | measurement clusters |
//! | Thermostat | Thermostat |
//! | Window Covering | WindowCovering |
//! | Door Lock | DoorLock |
//!
//! Every bridged endpoint additionally carries BridgedDeviceBasicInformation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Attribute names used by the bridge
pub mod attr {
    /// OnOff.onOff
    pub const ON_OFF: &str = "onOff";
    /// LevelControl.currentLevel
    pub const CURRENT_LEVEL: &str = "currentLevel";
    /// ColorControl.colorMode
    pub const COLOR_MODE: &str = "colorMode";
    /// ColorControl.currentHue
    pub const CURRENT_HUE: &str = "currentHue";
    /// ColorControl.currentSaturation
    pub const CURRENT_SATURATION: &str = "currentSaturation";
    /// ColorControl.colorTemperatureMireds
    pub const COLOR_TEMPERATURE_MIREDS: &str = "colorTemperatureMireds";
    /// Measurement clusters' measuredValue
    pub const MEASURED_VALUE: &str = "measuredValue";
    /// BooleanState.stateValue
    pub const STATE_VALUE: &str = "stateValue";
    /// OccupancySensing.occupancy
    pub const OCCUPANCY: &str = "occupancy";
    /// Thermostat.localTemperature
    pub const LOCAL_TEMPERATURE: &str = "localTemperature";
    /// Thermostat.occupiedHeatingSetpoint
    pub const OCCUPIED_HEATING_SETPOINT: &str = "occupiedHeatingSetpoint";
    /// WindowCovering.currentPositionLiftPercent100ths
    pub const CURRENT_LIFT_PERCENT_100THS: &str = "currentPositionLiftPercent100ths";
    /// WindowCovering.targetPositionLiftPercent100ths
    pub const TARGET_LIFT_PERCENT_100THS: &str = "targetPositionLiftPercent100ths";
    /// DoorLock.lockState
    pub const LOCK_STATE: &str = "lockState";
    /// BridgedDeviceBasicInformation.nodeLabel
    pub const NODE_LABEL: &str = "nodeLabel";
    /// BridgedDeviceBasicInformation.productName
    pub const PRODUCT_NAME: &str = "productName";
    /// BridgedDeviceBasicInformation.productLabel
    pub const PRODUCT_LABEL: &str = "productLabel";
    /// BridgedDeviceBasicInformation.serialNumber
    pub const SERIAL_NUMBER: &str = "serialNumber";
    /// BridgedDeviceBasicInformation.reachable
    pub const REACHABLE: &str = "reachable";
}

/// Identifier of an endpoint within the gateway's tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(pub String);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Protocol device types synthesized by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Bridge root enumerating bridged endpoints
    Aggregator,
    /// On/off light
    OnOffLight,
    /// Dimmable light
    DimmableLight,
    /// Light with tunable white
    ColorTemperatureLight,
    /// Light with hue/saturation (and optionally tunable white)
    ExtendedColorLight,
    /// Switched outlet
    OnOffPlugInUnit,
    /// Dimmable outlet
    DimmablePlugInUnit,
    /// Temperature sensor
    TemperatureSensor,
    /// Relative humidity sensor
    HumiditySensor,
    /// Open/closed sensor
    ContactSensor,
    /// Motion/presence sensor
    OccupancySensor,
    /// Heating thermostat
    Thermostat,
    /// Blind, shade or curtain
    WindowCovering,
    /// Lock
    DoorLock,
}

impl DeviceType {
    /// Protocol device type code
    pub const fn code(&self) -> u32 {
        match self {
            Self::Aggregator => 0x000E,
            Self::OnOffLight => 0x0100,
            Self::DimmableLight => 0x0101,
            Self::ColorTemperatureLight => 0x010C,
            Self::ExtendedColorLight => 0x010D,
            Self::OnOffPlugInUnit => 0x010A,
            Self::DimmablePlugInUnit => 0x010B,
            Self::TemperatureSensor => 0x0302,
            Self::HumiditySensor => 0x0307,
            Self::ContactSensor => 0x0015,
            Self::OccupancySensor => 0x0107,
            Self::Thermostat => 0x0301,
            Self::WindowCovering => 0x0202,
            Self::DoorLock => 0x000A,
        }
    }

    /// Human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Aggregator => "Aggregator",
            Self::OnOffLight => "On/Off Light",
            Self::DimmableLight => "Dimmable Light",
            Self::ColorTemperatureLight => "Color Temperature Light",
            Self::ExtendedColorLight => "Extended Color Light",
            Self::OnOffPlugInUnit => "On/Off Plug-in Unit",
            Self::DimmablePlugInUnit => "Dimmable Plug-in Unit",
            Self::TemperatureSensor => "Temperature Sensor",
            Self::HumiditySensor => "Humidity Sensor",
            Self::ContactSensor => "Contact Sensor",
            Self::OccupancySensor => "Occupancy Sensor",
            Self::Thermostat => "Thermostat",
            Self::WindowCovering => "Window Covering",
            Self::DoorLock => "Door Lock",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.name(), self.code())
    }
}

/// Protocol clusters used by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClusterId {
    /// 0x0039
    BridgedDeviceBasicInformation,
    /// 0x0006
    OnOff,
    /// 0x0008
    LevelControl,
    /// 0x0300
    ColorControl,
    /// 0x0402
    TemperatureMeasurement,
    /// 0x0405
    RelativeHumidityMeasurement,
    /// 0x0045
    BooleanState,
    /// 0x0406
    OccupancySensing,
    /// 0x0201
    Thermostat,
    /// 0x0102
    WindowCovering,
    /// 0x0101
    DoorLock,
}

impl ClusterId {
    /// Protocol cluster code
    pub const fn code(&self) -> u32 {
        match self {
            Self::BridgedDeviceBasicInformation => 0x0039,
            Self::OnOff => 0x0006,
            Self::LevelControl => 0x0008,
            Self::ColorControl => 0x0300,
            Self::TemperatureMeasurement => 0x0402,
            Self::RelativeHumidityMeasurement => 0x0405,
            Self::BooleanState => 0x0045,
            Self::OccupancySensing => 0x0406,
            Self::Thermostat => 0x0201,
            Self::WindowCovering => 0x0102,
            Self::DoorLock => 0x0101,
        }
    }

    /// Behavior name as used in attribute trees
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BridgedDeviceBasicInformation => "bridgedDeviceBasicInformation",
            Self::OnOff => "onOff",
            Self::LevelControl => "levelControl",
            Self::ColorControl => "colorControl",
            Self::TemperatureMeasurement => "temperatureMeasurement",
            Self::RelativeHumidityMeasurement => "relativeHumidityMeasurement",
            Self::BooleanState => "booleanState",
            Self::OccupancySensing => "occupancySensing",
            Self::Thermostat => "thermostat",
            Self::WindowCovering => "windowCovering",
            Self::DoorLock => "doorLock",
        }
    }

    /// All clusters
    pub const ALL: [ClusterId; 11] = [
        Self::BridgedDeviceBasicInformation,
        Self::OnOff,
        Self::LevelControl,
        Self::ColorControl,
        Self::TemperatureMeasurement,
        Self::RelativeHumidityMeasurement,
        Self::BooleanState,
        Self::OccupancySensing,
        Self::Thermostat,
        Self::WindowCovering,
        Self::DoorLock,
    ];
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ModelError::UnknownCluster(s.to_string()))
    }
}

/// ColorControl.colorMode values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorMode {
    /// currentHue / currentSaturation are active
    HueSaturation = 0,
    /// currentX / currentY are active
    Xy = 1,
    /// colorTemperatureMireds is active
    ColorTemperature = 2,
}

/// DoorLock.lockState values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LockState {
    /// Partially locked
    NotFullyLocked = 0,
    /// Locked
    Locked = 1,
    /// Unlocked
    Unlocked = 2,
}

/// A protocol attribute value
///
/// `Null` is the protocol's own "null" (nullable attributes), distinct
/// from zero, `false` or the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Protocol null
    Null,
    /// Boolean attribute
    Bool(bool),
    /// Integer attribute (all numeric attributes the bridge writes are integers)
    Int(i64),
    /// String attribute
    Text(String),
}

impl AttributeValue {
    /// Integer view
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Boolean view
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Check for protocol null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Option<bool>> for AttributeValue {
    fn from(b: Option<bool>) -> Self {
        b.map_or(Self::Null, Self::Bool)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<Option<i64>> for AttributeValue {
    fn from(i: Option<i64>) -> Self {
        i.map_or(Self::Null, Self::Int)
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// A partial or complete attribute tree: cluster → attribute → value
///
/// Used both for an endpoint's initial snapshot and for the patches
/// pushed when a capability changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSnapshot(BTreeMap<ClusterId, BTreeMap<String, AttributeValue>>);

impl AttributeSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one attribute
    pub fn set(
        &mut self,
        cluster: ClusterId,
        attribute: &str,
        value: impl Into<AttributeValue>,
    ) -> &mut Self {
        self.0
            .entry(cluster)
            .or_default()
            .insert(attribute.to_string(), value.into());
        self
    }

    /// Builder-style variant of [`set`](Self::set)
    pub fn with(mut self, cluster: ClusterId, attribute: &str, value: impl Into<AttributeValue>) -> Self {
        self.set(cluster, attribute, value);
        self
    }

    /// Read one attribute
    pub fn get(&self, cluster: ClusterId, attribute: &str) -> Option<&AttributeValue> {
        self.0.get(&cluster).and_then(|attrs| attrs.get(attribute))
    }

    /// Overlay another snapshot on top of this one
    pub fn merge(&mut self, other: &AttributeSnapshot) {
        for (cluster, attrs) in &other.0 {
            let target = self.0.entry(*cluster).or_default();
            for (name, value) in attrs {
                target.insert(name.clone(), value.clone());
            }
        }
    }

    /// Check whether any cluster has attributes
    pub fn contains_cluster(&self, cluster: ClusterId) -> bool {
        self.0.contains_key(&cluster)
    }

    /// Clusters present in the snapshot
    pub fn clusters(&self) -> impl Iterator<Item = ClusterId> + '_ {
        self.0.keys().copied()
    }

    /// Number of attributes across all clusters
    pub fn attribute_count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// Check for an empty snapshot
    pub fn is_empty(&self) -> bool {
        self.attribute_count() == 0
    }

    /// Iterate `(cluster, attribute, value)` triples
    pub fn iter(&self) -> impl Iterator<Item = (ClusterId, &str, &AttributeValue)> {
        self.0.iter().flat_map(|(cluster, attrs)| {
            attrs
                .iter()
                .map(move |(name, value)| (*cluster, name.as_str(), value))
        })
    }
}

/// The endpoint a mapping rule synthesizes for a device
///
/// Pure data: recomputing it from an unchanged capability set yields an
/// identical value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointShape {
    /// Device type of the endpoint
    pub device_type: DeviceType,
    /// Clusters to attach, in order
    pub clusters: Vec<ClusterId>,
    /// Initial attribute values
    pub attributes: AttributeSnapshot,
}

impl EndpointShape {
    /// Create a shape with no attributes yet
    pub fn new(device_type: DeviceType, clusters: Vec<ClusterId>) -> Self {
        Self {
            device_type,
            clusters,
            attributes: AttributeSnapshot::new(),
        }
    }

    /// Check whether a cluster is attached
    pub fn has_cluster(&self, cluster: ClusterId) -> bool {
        self.clusters.contains(&cluster)
    }
}

/// A command invoked on a bridged endpoint by a protocol controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundCommand {
    /// OnOff.On / OnOff.Off (toggle is resolved by the gateway)
    OnOff {
        /// Requested state
        on: bool,
    },
    /// LevelControl.MoveToLevel / MoveToLevelWithOnOff
    MoveToLevel {
        /// Target level, 1..=254
        level: u8,
        /// Whether on/off follows the level
        with_on_off: bool,
    },
    /// ColorControl.MoveToHue
    MoveToHue {
        /// Target hue, 0..=254
        hue: u8,
    },
    /// ColorControl.MoveToSaturation
    MoveToSaturation {
        /// Target saturation, 0..=254
        saturation: u8,
    },
    /// ColorControl.MoveToHueAndSaturation
    MoveToHueAndSaturation {
        /// Target hue, 0..=254
        hue: u8,
        /// Target saturation, 0..=254
        saturation: u8,
    },
    /// ColorControl.MoveToColorTemperature
    MoveToColorTemperature {
        /// Target color temperature in mireds
        mireds: u16,
    },
    /// Write to Thermostat.occupiedHeatingSetpoint
    SetHeatingSetpoint {
        /// Setpoint in hundredths of a degree Celsius
        setpoint: i16,
    },
    /// WindowCovering.GoToLiftPercentage
    GoToLiftPercentage {
        /// Target lift, 0 = open, 10000 = closed
        percent_100ths: u16,
    },
    /// DoorLock.LockDoor
    LockDoor,
    /// DoorLock.UnlockDoor
    UnlockDoor,
}

impl InboundCommand {
    /// Cluster the command belongs to
    pub fn cluster(&self) -> ClusterId {
        match self {
            Self::OnOff { .. } => ClusterId::OnOff,
            Self::MoveToLevel { .. } => ClusterId::LevelControl,
            Self::MoveToHue { .. }
            | Self::MoveToSaturation { .. }
            | Self::MoveToHueAndSaturation { .. }
            | Self::MoveToColorTemperature { .. } => ClusterId::ColorControl,
            Self::SetHeatingSetpoint { .. } => ClusterId::Thermostat,
            Self::GoToLiftPercentage { .. } => ClusterId::WindowCovering,
            Self::LockDoor | Self::UnlockDoor => ClusterId::DoorLock,
        }
    }
}
