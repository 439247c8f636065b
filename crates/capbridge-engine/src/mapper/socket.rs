//! Rules for the `socket` class

use capbridge_core::DeviceType;

use super::MappingRule;
use crate::binding::Role;

/// Socket rules, highest priority first
pub const RULES: &[MappingRule] = &[
    MappingRule::new(
        "dimmable_plug_in_unit",
        DeviceType::DimmablePlugInUnit,
        &[Role::OnOff, Role::Dim],
        &[],
    ),
    MappingRule::new(
        "on_off_plug_in_unit",
        DeviceType::OnOffPlugInUnit,
        &[Role::OnOff],
        &[],
    ),
];
