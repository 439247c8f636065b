//! Rules for the `light` class
//!
//! Richer capability sets win: a light with hue, saturation and
//! temperature is exposed as an Extended Color Light before any simpler
//! type is considered.

use capbridge_core::DeviceType;

use super::MappingRule;
use crate::binding::Role;

/// Light rules, highest priority first
pub const RULES: &[MappingRule] = &[
    MappingRule::new(
        "extended_color_light_with_temperature",
        DeviceType::ExtendedColorLight,
        &[Role::OnOff, Role::Dim, Role::Hue, Role::Saturation, Role::Temperature],
        &[Role::LightMode],
    ),
    MappingRule::new(
        "color_temperature_light",
        DeviceType::ColorTemperatureLight,
        &[Role::OnOff, Role::Dim, Role::Temperature],
        &[],
    ),
    MappingRule::new(
        "extended_color_light",
        DeviceType::ExtendedColorLight,
        &[Role::OnOff, Role::Dim, Role::Hue, Role::Saturation],
        &[],
    ),
    MappingRule::new(
        "dimmable_light",
        DeviceType::DimmableLight,
        &[Role::OnOff, Role::Dim],
        &[],
    ),
    MappingRule::new("on_off_light", DeviceType::OnOffLight, &[Role::OnOff], &[]),
];
