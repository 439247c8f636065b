//! Capability bindings
//!
//! A [`CapabilityTable`] records which source capability backs each
//! protocol-side role of an endpoint. Mapping rules build it; the
//! translator and command handler read it.

use capbridge_core::{ClusterId, Device};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// The protocol-side meaning of a bound capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// OnOff.onOff
    OnOff,
    /// LevelControl.currentLevel
    Dim,
    /// ColorControl.currentHue
    Hue,
    /// ColorControl.currentSaturation
    Saturation,
    /// ColorControl.colorTemperatureMireds
    Temperature,
    /// ColorControl.colorMode selector
    LightMode,
    /// TemperatureMeasurement.measuredValue
    MeasureTemperature,
    /// RelativeHumidityMeasurement.measuredValue
    MeasureHumidity,
    /// BooleanState.stateValue
    AlarmContact,
    /// OccupancySensing.occupancy
    AlarmMotion,
    /// Thermostat.localTemperature
    LocalTemperature,
    /// Thermostat.occupiedHeatingSetpoint
    TargetTemperature,
    /// WindowCovering lift position
    CoverPosition,
    /// DoorLock.lockState
    Locked,
}

impl Role {
    /// Source capability id conventionally backing this role
    pub const fn default_capability(&self) -> &'static str {
        match self {
            Role::OnOff => "onoff",
            Role::Dim => "dim",
            Role::Hue => "light_hue",
            Role::Saturation => "light_saturation",
            Role::Temperature => "light_temperature",
            Role::LightMode => "light_mode",
            Role::MeasureTemperature | Role::LocalTemperature => "measure_temperature",
            Role::MeasureHumidity => "measure_humidity",
            Role::AlarmContact => "alarm_contact",
            Role::AlarmMotion => "alarm_motion",
            Role::TargetTemperature => "target_temperature",
            Role::CoverPosition => "windowcoverings_set",
            Role::Locked => "locked",
        }
    }

    /// Cluster the role's attributes live on
    pub const fn cluster(&self) -> ClusterId {
        match self {
            Role::OnOff => ClusterId::OnOff,
            Role::Dim => ClusterId::LevelControl,
            Role::Hue | Role::Saturation | Role::Temperature | Role::LightMode => {
                ClusterId::ColorControl
            }
            Role::MeasureTemperature => ClusterId::TemperatureMeasurement,
            Role::MeasureHumidity => ClusterId::RelativeHumidityMeasurement,
            Role::AlarmContact => ClusterId::BooleanState,
            Role::AlarmMotion => ClusterId::OccupancySensing,
            Role::LocalTemperature | Role::TargetTemperature => ClusterId::Thermostat,
            Role::CoverPosition => ClusterId::WindowCovering,
            Role::Locked => ClusterId::DoorLock,
        }
    }
}

/// Role → capability bindings for one endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityTable {
    roles: BTreeMap<Role, String>,
    read_only: BTreeSet<String>,
}

impl CapabilityTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a role to its conventional capability
    pub fn bind(mut self, role: Role) -> Self {
        self.roles.insert(role, role.default_capability().to_string());
        self
    }

    /// Bind a role to a specific capability
    pub fn bind_as(mut self, role: Role, capability_id: impl Into<String>) -> Self {
        self.roles.insert(role, capability_id.into());
        self
    }

    /// Bind `required` roles and whichever `optional` roles the device has
    ///
    /// Capabilities the device declares as not setable are recorded as
    /// read-only.
    pub fn for_device(device: &Device, required: &[Role], optional: &[Role]) -> Self {
        let mut table = required.iter().fold(Self::new(), |t, role| t.bind(*role));
        for role in optional {
            if device.has_capability(role.default_capability()) {
                table = table.bind(*role);
            }
        }
        table.read_only = table
            .roles
            .values()
            .filter(|cap| {
                device
                    .capabilities_obj
                    .get(cap.as_str())
                    .is_some_and(|c| c.is_read_only())
            })
            .cloned()
            .collect();
        table
    }

    /// Capability bound to a role
    pub fn capability(&self, role: Role) -> Option<&str> {
        self.roles.get(&role).map(String::as_str)
    }

    /// Check whether a role is bound
    pub fn has(&self, role: Role) -> bool {
        self.roles.contains_key(&role)
    }

    /// Roles a capability backs
    pub fn roles_for<'a>(&'a self, capability_id: &'a str) -> impl Iterator<Item = Role> + 'a {
        self.roles
            .iter()
            .filter(move |(_, cap)| cap.as_str() == capability_id)
            .map(|(role, _)| *role)
    }

    /// Bound roles in order
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.keys().copied()
    }

    /// Distinct bound capability ids, sorted
    pub fn capability_ids(&self) -> Vec<String> {
        let ids: BTreeSet<&String> = self.roles.values().collect();
        ids.into_iter().cloned().collect()
    }

    /// Distinct clusters the bound roles need, in cluster order
    pub fn clusters(&self) -> Vec<ClusterId> {
        let clusters: BTreeSet<ClusterId> = self.roles.keys().map(Role::cluster).collect();
        clusters.into_iter().collect()
    }

    /// Check whether writes to a capability must be refused
    pub fn is_read_only(&self, capability_id: &str) -> bool {
        self.read_only.contains(capability_id)
    }

    /// Number of bound roles
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Check for an empty table
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
