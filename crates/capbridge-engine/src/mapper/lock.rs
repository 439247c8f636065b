//! Rules for the `lock` class

use capbridge_core::DeviceType;

use super::MappingRule;
use crate::binding::Role;

/// Lock rules
pub const RULES: &[MappingRule] = &[MappingRule::new(
    "door_lock",
    DeviceType::DoorLock,
    &[Role::Locked],
    &[],
)];
