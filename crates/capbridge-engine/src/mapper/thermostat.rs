//! Rules for the `thermostat` class

use capbridge_core::DeviceType;

use super::MappingRule;
use crate::binding::Role;

/// Thermostat rules
pub const RULES: &[MappingRule] = &[MappingRule::new(
    "heating_thermostat",
    DeviceType::Thermostat,
    &[Role::TargetTemperature],
    &[Role::LocalTemperature],
)];
