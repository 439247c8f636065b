//! Capbridge Core - Shared model for the capability bridge
//!
//! This crate holds the two data models the bridge reconciles, plus the
//! pure conversions between them:
//!
//! - [`device`] - Source-platform devices with an open-ended set of typed
//!   capabilities (`onoff`, `dim`, `light_hue`, ...)
//! - [`endpoint`] - Protocol-side device types, clusters, attributes and
//!   inbound commands, and the [`EndpointShape`] synthesized per device
//! - [`transform`] - Range scaling, rounding, clamping and label truncation
//! - [`error`] - Model error types
//!
//! # Example
//!
//! ```rust
//! use capbridge_core::transform::{dim_to_level, level_to_dim};
//!
//! let level = dim_to_level(Some(0.5));
//! assert_eq!(level, Some(127));
//! assert!((level_to_dim(127) - 0.5).abs() < 0.01);
//! ```

pub mod device;
pub mod endpoint;
pub mod error;
pub mod transform;

pub use device::{
    Capability, CapabilityType, CapabilityValue, Device, DeviceId, Driver, Zone,
};
pub use endpoint::{
    attr, AttributeSnapshot, AttributeValue, ClusterId, ColorMode, DeviceType, EndpointId,
    EndpointShape, InboundCommand, LockState,
};
pub use error::{ModelError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
