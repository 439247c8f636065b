//! Attribute translation
//!
//! Forward: capability values → attribute patches. Reverse: inbound
//! protocol commands → capability writes. Both directions are pure and
//! driven by an endpoint's [`CapabilityTable`].
//!
//! # Null handling
//!
//! A capability whose value is unknown produces the protocol's null for
//! the attributes it backs, never zero or `false`.
//!
//! # Color mode
//!
//! Lights bound to both hue/saturation and temperature follow
//! `light_mode`: only the attributes of the active mode are written, and
//! changes to the inactive mode's capabilities produce no patch. A mode
//! switch nulls the attributes of the mode being left.
//!
//! Such lights without a `light_mode` capability follow the last color
//! capability that changed or was written; see [`implied_light_mode`].

use capbridge_core::transform::{
    celsius_to_100ths, cover_to_lift, dim_to_level, hue_to_protocol, humidity_to_100ths,
    hundredths_to_celsius, level_to_dim, lift_to_cover, mireds_to_temperature, protocol_to_hue,
    protocol_to_saturation, saturation_to_protocol, temperature_to_mireds, LEVEL_MIN,
};
use capbridge_core::{
    attr, AttributeSnapshot, AttributeValue, CapabilityValue, ClusterId, ColorMode,
    InboundCommand, LockState,
};
use std::collections::HashMap;

use crate::binding::{CapabilityTable, Role};
use crate::error::{BridgeError, Result};

/// Last known capability values of one device
pub type CapabilityValues = HashMap<String, CapabilityValue>;

/// `light_mode` value selecting hue/saturation
pub const LIGHT_MODE_COLOR: &str = "color";

/// `light_mode` value selecting color temperature
pub const LIGHT_MODE_TEMPERATURE: &str = "temperature";

/// One capability write produced by an inbound command
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityWrite {
    /// Target capability
    pub capability_id: String,
    /// Value to write
    pub value: CapabilityValue,
}

fn value<'a>(table: &CapabilityTable, values: &'a CapabilityValues, role: Role) -> Option<&'a CapabilityValue> {
    table.capability(role).and_then(|cap| values.get(cap))
}

fn number(table: &CapabilityTable, values: &CapabilityValues, role: Role) -> Option<f64> {
    value(table, values, role).and_then(CapabilityValue::as_f64)
}

fn boolean(table: &CapabilityTable, values: &CapabilityValues, role: Role) -> Option<bool> {
    value(table, values, role).and_then(CapabilityValue::as_bool)
}

fn int<T: Into<i64>>(v: Option<T>) -> AttributeValue {
    let v: Option<i64> = v.map(Into::into);
    v.into()
}

fn is_color_role(role: Role) -> bool {
    matches!(
        role,
        Role::Hue | Role::Saturation | Role::Temperature | Role::LightMode
    )
}

fn is_dual_mode(table: &CapabilityTable) -> bool {
    (table.has(Role::Hue) || table.has(Role::Saturation)) && table.has(Role::Temperature)
}

/// Key the light mode is read from
///
/// The bound `light_mode` capability, or the same name holding the mode
/// inferred for lights that have none.
pub fn light_mode_key(table: &CapabilityTable) -> &str {
    table
        .capability(Role::LightMode)
        .unwrap_or(Role::LightMode.default_capability())
}

/// Color mode a light is currently in
pub fn active_color_mode(table: &CapabilityTable, values: &CapabilityValues) -> ColorMode {
    let has_hs = table.has(Role::Hue) || table.has(Role::Saturation);
    let has_ct = table.has(Role::Temperature);
    match (has_hs, has_ct) {
        (true, true) => match values.get(light_mode_key(table)).and_then(CapabilityValue::as_str) {
            Some(LIGHT_MODE_TEMPERATURE) => ColorMode::ColorTemperature,
            _ => ColorMode::HueSaturation,
        },
        (false, true) => ColorMode::ColorTemperature,
        _ => ColorMode::HueSaturation,
    }
}

/// Light mode implied by a change to `capability_id`
///
/// Only lights bound to both color modes and lacking a `light_mode`
/// capability infer their mode; for every other table this is `None`.
pub fn implied_light_mode(table: &CapabilityTable, capability_id: &str) -> Option<&'static str> {
    if !is_dual_mode(table) || table.has(Role::LightMode) {
        return None;
    }
    table
        .roles_for(capability_id)
        .find_map(mode_of)
        .map(|mode| match mode {
            ColorMode::ColorTemperature => LIGHT_MODE_TEMPERATURE,
            _ => LIGHT_MODE_COLOR,
        })
}

fn role_attributes(
    role: Role,
    table: &CapabilityTable,
    values: &CapabilityValues,
    out: &mut AttributeSnapshot,
) {
    match role {
        Role::OnOff => {
            out.set(ClusterId::OnOff, attr::ON_OFF, boolean(table, values, role));
        }
        Role::Dim => {
            out.set(
                ClusterId::LevelControl,
                attr::CURRENT_LEVEL,
                int(dim_to_level(number(table, values, role))),
            );
        }
        Role::MeasureTemperature => {
            out.set(
                ClusterId::TemperatureMeasurement,
                attr::MEASURED_VALUE,
                int(celsius_to_100ths(number(table, values, role))),
            );
        }
        Role::MeasureHumidity => {
            out.set(
                ClusterId::RelativeHumidityMeasurement,
                attr::MEASURED_VALUE,
                int(humidity_to_100ths(number(table, values, role))),
            );
        }
        Role::AlarmContact => {
            // stateValue is true while the contact is closed
            let closed = boolean(table, values, role).map(|open| !open);
            out.set(ClusterId::BooleanState, attr::STATE_VALUE, closed);
        }
        Role::AlarmMotion => {
            let occupancy = boolean(table, values, role).map(i64::from);
            out.set(ClusterId::OccupancySensing, attr::OCCUPANCY, occupancy);
        }
        Role::LocalTemperature => {
            out.set(
                ClusterId::Thermostat,
                attr::LOCAL_TEMPERATURE,
                int(celsius_to_100ths(number(table, values, role))),
            );
        }
        Role::TargetTemperature => {
            out.set(
                ClusterId::Thermostat,
                attr::OCCUPIED_HEATING_SETPOINT,
                int(celsius_to_100ths(number(table, values, role))),
            );
        }
        Role::CoverPosition => {
            let lift = int(cover_to_lift(number(table, values, role)));
            out.set(ClusterId::WindowCovering, attr::CURRENT_LIFT_PERCENT_100THS, lift.clone());
            out.set(ClusterId::WindowCovering, attr::TARGET_LIFT_PERCENT_100THS, lift);
        }
        Role::Locked => {
            let state = boolean(table, values, role).map(|locked| {
                if locked {
                    LockState::Locked as i64
                } else {
                    LockState::Unlocked as i64
                }
            });
            out.set(ClusterId::DoorLock, attr::LOCK_STATE, state);
        }
        Role::Hue => {
            out.set(
                ClusterId::ColorControl,
                attr::CURRENT_HUE,
                int(hue_to_protocol(number(table, values, role))),
            );
        }
        Role::Saturation => {
            out.set(
                ClusterId::ColorControl,
                attr::CURRENT_SATURATION,
                int(saturation_to_protocol(number(table, values, role))),
            );
        }
        Role::Temperature => {
            out.set(
                ClusterId::ColorControl,
                attr::COLOR_TEMPERATURE_MIREDS,
                int(temperature_to_mireds(number(table, values, role))),
            );
        }
        Role::LightMode => {}
    }
}

fn color_block(
    table: &CapabilityTable,
    values: &CapabilityValues,
    clear_inactive: bool,
    out: &mut AttributeSnapshot,
) {
    let mode = active_color_mode(table, values);
    out.set(ClusterId::ColorControl, attr::COLOR_MODE, mode as i64);
    let (active, inactive): (&[Role], &[Role]) = match mode {
        ColorMode::ColorTemperature => (&[Role::Temperature], &[Role::Hue, Role::Saturation]),
        _ => (&[Role::Hue, Role::Saturation], &[Role::Temperature]),
    };
    for role in active.iter().copied().filter(|r| table.has(*r)) {
        role_attributes(role, table, values, out);
    }
    if clear_inactive {
        for role in inactive.iter().copied().filter(|r| table.has(*r)) {
            let (cluster, attribute) = color_attribute(role);
            out.set(cluster, attribute, AttributeValue::Null);
        }
    }
}

fn color_attribute(role: Role) -> (ClusterId, &'static str) {
    match role {
        Role::Hue => (ClusterId::ColorControl, attr::CURRENT_HUE),
        Role::Saturation => (ClusterId::ColorControl, attr::CURRENT_SATURATION),
        _ => (ClusterId::ColorControl, attr::COLOR_TEMPERATURE_MIREDS),
    }
}

fn mode_of(role: Role) -> Option<ColorMode> {
    match role {
        Role::Hue | Role::Saturation => Some(ColorMode::HueSaturation),
        Role::Temperature => Some(ColorMode::ColorTemperature),
        _ => None,
    }
}

/// Full attribute snapshot for an endpoint
pub fn snapshot(table: &CapabilityTable, values: &CapabilityValues) -> AttributeSnapshot {
    let mut out = AttributeSnapshot::new();
    let mut color = false;
    for role in table.roles() {
        if is_color_role(role) {
            color = true;
        } else {
            role_attributes(role, table, values, &mut out);
        }
    }
    if color {
        color_block(table, values, false, &mut out);
    }
    out
}

/// Patch for a single capability change
///
/// `values` must already contain the new value, and the mode from
/// [`implied_light_mode`] when there is one. Returns an empty patch when
/// the capability is unbound or backs an inactive color mode.
pub fn forward(
    table: &CapabilityTable,
    values: &CapabilityValues,
    capability_id: &str,
) -> AttributeSnapshot {
    let mut out = AttributeSnapshot::new();
    let inferred = implied_light_mode(table, capability_id).is_some();
    for role in table.roles_for(capability_id) {
        if role == Role::LightMode || (inferred && mode_of(role).is_some()) {
            color_block(table, values, true, &mut out);
            continue;
        }
        match mode_of(role) {
            Some(mode) if mode != active_color_mode(table, values) => {}
            _ => role_attributes(role, table, values, &mut out),
        }
    }
    out
}

fn write(
    table: &CapabilityTable,
    command: &InboundCommand,
    role: Role,
    value: impl Into<CapabilityValue>,
) -> Result<CapabilityWrite> {
    let capability_id = table.capability(role).ok_or_else(|| {
        BridgeError::UnsupportedCommand(format!("{command:?} has no {role:?} capability"))
    })?;
    if table.is_read_only(capability_id) {
        return Err(BridgeError::UnsupportedCommand(format!(
            "{command:?} targets read-only capability {capability_id}"
        )));
    }
    Ok(CapabilityWrite {
        capability_id: capability_id.to_string(),
        value: value.into(),
    })
}

fn with_mode(
    table: &CapabilityTable,
    command: &InboundCommand,
    mut writes: Vec<CapabilityWrite>,
    mode: &str,
) -> Result<Vec<CapabilityWrite>> {
    if is_dual_mode(table) && table.has(Role::LightMode) {
        writes.push(write(table, command, Role::LightMode, mode)?);
    }
    Ok(writes)
}

/// Capability writes for an inbound command
///
/// Commands with no bound capability, or that target a read-only one,
/// yield [`BridgeError::UnsupportedCommand`].
pub fn reverse(table: &CapabilityTable, command: InboundCommand) -> Result<Vec<CapabilityWrite>> {
    let cmd = &command;
    match command {
        InboundCommand::OnOff { on } => Ok(vec![write(table, cmd, Role::OnOff, on)?]),
        InboundCommand::MoveToLevel { level, with_on_off } => {
            let mut writes = vec![write(table, cmd, Role::Dim, level_to_dim(level))?];
            if with_on_off && table.has(Role::OnOff) {
                writes.push(write(table, cmd, Role::OnOff, level > LEVEL_MIN)?);
            }
            Ok(writes)
        }
        InboundCommand::MoveToHue { hue } => with_mode(
            table,
            cmd,
            vec![write(table, cmd, Role::Hue, protocol_to_hue(hue))?],
            LIGHT_MODE_COLOR,
        ),
        InboundCommand::MoveToSaturation { saturation } => with_mode(
            table,
            cmd,
            vec![write(table, cmd, Role::Saturation, protocol_to_saturation(saturation))?],
            LIGHT_MODE_COLOR,
        ),
        InboundCommand::MoveToHueAndSaturation { hue, saturation } => with_mode(
            table,
            cmd,
            vec![
                write(table, cmd, Role::Hue, protocol_to_hue(hue))?,
                write(table, cmd, Role::Saturation, protocol_to_saturation(saturation))?,
            ],
            LIGHT_MODE_COLOR,
        ),
        InboundCommand::MoveToColorTemperature { mireds } => with_mode(
            table,
            cmd,
            vec![write(table, cmd, Role::Temperature, mireds_to_temperature(mireds))?],
            LIGHT_MODE_TEMPERATURE,
        ),
        InboundCommand::SetHeatingSetpoint { setpoint } => Ok(vec![write(
            table,
            cmd,
            Role::TargetTemperature,
            hundredths_to_celsius(setpoint),
        )?]),
        InboundCommand::GoToLiftPercentage { percent_100ths } => Ok(vec![write(
            table,
            cmd,
            Role::CoverPosition,
            lift_to_cover(percent_100ths),
        )?]),
        InboundCommand::LockDoor => Ok(vec![write(table, cmd, Role::Locked, true)?]),
        InboundCommand::UnlockDoor => Ok(vec![write(table, cmd, Role::Locked, false)?]),
    }
}
