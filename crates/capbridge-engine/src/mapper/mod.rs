//! Capability mapper registry
//!
//! Decides, from a device's effective class and capability set, which
//! protocol endpoint shape to synthesize. Rules are plain data: each class
//! owns an ordered list, the first rule whose required capabilities are all
//! present wins, and no match means the device is unsupported.
//!
//! ```text
//! light   ─► extended color + temperature ─► color temperature ─► extended color ─► dimmable ─► on/off
//! socket  ─► dimmable plug ─► on/off plug
//! sensor  ─► occupancy ─► contact ─► temperature (+humidity) ─► humidity
//! ...
//! ```

pub mod cover;
pub mod light;
pub mod lock;
pub mod sensor;
pub mod socket;
pub mod thermostat;

use capbridge_core::{Device, DeviceType, EndpointShape};
use std::collections::BTreeMap;
use tracing::debug;

use crate::binding::{CapabilityTable, Role};
use crate::translator::{self, CapabilityValues};

/// One entry in a class's rule list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingRule {
    /// Rule name, for logs
    pub name: &'static str,
    /// Device type to synthesize
    pub device_type: DeviceType,
    /// Roles whose capabilities must all be present
    pub required: &'static [Role],
    /// Roles bound when their capability is present
    pub optional: &'static [Role],
}

impl MappingRule {
    /// Create a rule
    pub const fn new(
        name: &'static str,
        device_type: DeviceType,
        required: &'static [Role],
        optional: &'static [Role],
    ) -> Self {
        Self {
            name,
            device_type,
            required,
            optional,
        }
    }

    /// Check whether the device satisfies the rule
    pub fn matches(&self, device: &Device) -> bool {
        !self.required.is_empty()
            && self
                .required
                .iter()
                .all(|role| device.has_capability(role.default_capability()))
    }

    /// Build the capability bindings for a matching device
    pub fn bind(&self, device: &Device) -> CapabilityTable {
        CapabilityTable::for_device(device, self.required, self.optional)
    }
}

/// Result of mapping a device
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    /// Name of the rule that matched
    pub rule: &'static str,
    /// Endpoint to create
    pub shape: EndpointShape,
    /// Capability bindings
    pub table: CapabilityTable,
}

/// Current values of every capability on a device
pub fn capability_values(device: &Device) -> CapabilityValues {
    device
        .capabilities_obj
        .iter()
        .map(|(id, cap)| (id.clone(), cap.value.clone()))
        .collect()
}

/// Class → ordered mapping rules
#[derive(Debug, Clone, Default)]
pub struct MapperRegistry {
    classes: BTreeMap<String, Vec<MappingRule>>,
}

impl MapperRegistry {
    /// Registry with every built-in device class
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_all("light", light::RULES);
        registry.register_all("socket", socket::RULES);
        registry.register_all("sensor", sensor::RULES);
        registry.register_all("thermostat", thermostat::RULES);
        for class in cover::CLASSES {
            registry.register_all(class, cover::RULES);
        }
        registry.register_all("lock", lock::RULES);
        registry
    }

    /// Registry with no rules
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a rule to a class at lowest priority
    pub fn register(&mut self, class: impl Into<String>, rule: MappingRule) {
        self.classes.entry(class.into()).or_default().push(rule);
    }

    /// Append several rules in priority order
    pub fn register_all(&mut self, class: &str, rules: &[MappingRule]) {
        self.classes
            .entry(class.to_string())
            .or_default()
            .extend_from_slice(rules);
    }

    /// Rules for a class, highest priority first
    pub fn rules_for(&self, class: &str) -> &[MappingRule] {
        self.classes.get(class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Classes with at least one rule
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// First matching rule for a device
    pub fn select(&self, device: &Device) -> Option<&MappingRule> {
        self.rules_for(device.effective_class())
            .iter()
            .find(|rule| rule.matches(device))
    }

    /// Check whether a device would be bridged
    pub fn supports(&self, device: &Device) -> bool {
        self.select(device).is_some()
    }

    /// Map a device to an endpoint shape
    ///
    /// Returns `None` for unsupported devices. The result depends only on
    /// the device's class and capabilities.
    pub fn synthesize(&self, device: &Device) -> Option<Synthesis> {
        let Some(rule) = self.select(device) else {
            debug!(
                device_id = %device.id,
                class = %device.effective_class(),
                "No mapping rule matches device"
            );
            return None;
        };

        let table = rule.bind(device);
        let values = capability_values(device);
        let shape = EndpointShape {
            device_type: rule.device_type,
            clusters: table.clusters(),
            attributes: translator::snapshot(&table, &values),
        };

        Some(Synthesis {
            rule: rule.name,
            shape,
            table,
        })
    }
}
