//! Rules for the `sensor` class
//!
//! A sensor reporting several measurements gets one endpoint carrying all
//! of the measurement clusters it has. The device type follows the most
//! specific measurement present.

use capbridge_core::DeviceType;

use super::MappingRule;
use crate::binding::Role;

const MEASUREMENTS: &[Role] = &[Role::MeasureTemperature, Role::MeasureHumidity];

/// Sensor rules, highest priority first
pub const RULES: &[MappingRule] = &[
    MappingRule::new(
        "occupancy_sensor",
        DeviceType::OccupancySensor,
        &[Role::AlarmMotion],
        MEASUREMENTS,
    ),
    MappingRule::new(
        "contact_sensor",
        DeviceType::ContactSensor,
        &[Role::AlarmContact],
        MEASUREMENTS,
    ),
    MappingRule::new(
        "temperature_sensor",
        DeviceType::TemperatureSensor,
        &[Role::MeasureTemperature],
        &[Role::MeasureHumidity],
    ),
    MappingRule::new(
        "humidity_sensor",
        DeviceType::HumiditySensor,
        &[Role::MeasureHumidity],
        &[],
    ),
];
