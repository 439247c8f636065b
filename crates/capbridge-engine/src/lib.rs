//! Capability Bridge Engine
//!
//! This crate exposes devices of a home-automation platform as endpoints of
//! a mesh home-automation protocol. Each device the user enables becomes one
//! bridged endpoint under the bridge's aggregator, and the two stay in sync
//! in both directions.
//!
//! # Architecture
//!
//! The engine works in four layers:
//!
//! 1. **Collaborators** - [`SourcePlatform`] and [`ProtocolGateway`] traits
//!    for the two sides, plus a [`SettingsStore`] for persistence
//! 2. **Mapping** - [`MapperRegistry`] picks the first rule a device
//!    satisfies and synthesizes an [`EndpointShape`](capbridge_core::EndpointShape)
//! 3. **Translation** - [`translator`] turns capability changes into
//!    attribute patches and inbound commands into capability writes
//! 4. **Lifecycle** - [`BridgeManager`] owns one [`BridgeEntry`] per bridged
//!    device and drives it through initialize, active and teardown
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use capbridge_engine::{BridgeConfigBuilder, BridgeManager};
//! use std::sync::Arc;
//!
//! let config = BridgeConfigBuilder::new().unique_id(hub_id).build();
//! let manager = Arc::new(BridgeManager::new(config, platform, gateway_factory, settings));
//! manager.start().await?;
//! manager.enable_device(&"lamp-1".into()).await?;
//! println!("{:?}", manager.get_state().qr_pairing_code);
//! ```
//!
//! # Update Flow
//!
//! ## Source → protocol
//!
//! 1. The platform invokes a capability listener
//! 2. The entry's update pump records the value and checks the entry is active
//! 3. [`translator::forward`] builds the attribute patch
//! 4. The gateway applies the patch to the endpoint
//!
//! ## Protocol → source
//!
//! 1. A controller invokes a command on the endpoint
//! 2. [`CommandHandler`] translates it with [`translator::reverse`]
//! 3. The resulting writes go to the platform; compound writes roll back on
//!    partial failure

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Collaborators
pub mod config;
pub mod error;
pub mod gateway;
pub mod settings;
pub mod source;

// Mapping and translation
pub mod binding;
pub mod mapper;
pub mod translator;

// Lifecycle
pub mod adapter;
pub mod bridge;
pub mod entry;
pub mod handler;
pub mod stats;
mod task;

// Testing utilities
pub mod test_utils;

pub use adapter::{DeviceAdapter, SubscriptionKey};
pub use binding::{CapabilityTable, Role};
pub use bridge::{BridgeManager, BridgeState, DeviceSummary};
pub use config::{
    BridgeConfig, BridgeConfigBuilder, RuntimeConfig, ServerNodeConfig, ServerNodeOptions,
};
pub use entry::{BridgeEntry, EntryInfo, EntryState};
pub use error::{BridgeError, Result};
pub use gateway::{
    CommissioningStatus, EndpointDescriptor, EndpointRegistration, GatewayFactory, GatewayState,
    ProtocolGateway, AGGREGATOR_ENDPOINT_ID,
};
pub use handler::CommandHandler;
pub use mapper::{MapperRegistry, MappingRule, Synthesis};
pub use settings::{EnabledDeviceSet, MemorySettings, SettingsStore};
pub use source::{CapabilityInstance, CapabilityListener, DeviceEvent, SourcePlatform};
pub use stats::BridgeStats;
pub use translator::{CapabilityValues, CapabilityWrite};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
