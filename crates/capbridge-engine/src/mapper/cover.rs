//! Rules for window coverings

use capbridge_core::DeviceType;

use super::MappingRule;
use crate::binding::Role;

/// Classes that share the window covering rules
pub const CLASSES: &[&str] = &["windowcoverings", "blinds", "curtain", "sunshade"];

/// Window covering rules
pub const RULES: &[MappingRule] = &[MappingRule::new(
    "window_covering",
    DeviceType::WindowCovering,
    &[Role::CoverPosition],
    &[],
)];
