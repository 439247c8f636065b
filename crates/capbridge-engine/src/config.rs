//! Configuration types for the bridge
//!
//! Two sections: `server` describes the protocol server node the bridge
//! exposes (identity, commissioning and network settings), `runtime` holds
//! the engine's own tunables.

use capbridge_core::transform::truncate_label;
use capbridge_core::DeviceType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Default server node name
pub const DEFAULT_DEVICE_NAME: &str = "Homey Matter Bridge";

/// Default vendor name
pub const DEFAULT_VENDOR_NAME: &str = "Athom B.V.";

/// Default vendor id (test vendor)
pub const DEFAULT_VENDOR_ID: u16 = 0xFFF1;

/// Default product id
pub const DEFAULT_PRODUCT_ID: u16 = 0x8000;

/// Default protocol UDP port
pub const DEFAULT_PORT: u16 = 5540;

/// Default setup passcode
pub const DEFAULT_PASSCODE: u32 = 20202021;

/// Default discriminator
pub const DEFAULT_DISCRIMINATOR: u16 = 3840;

/// Largest valid discriminator (12 bits)
pub const MAX_DISCRIMINATOR: u16 = 0x0FFF;

/// Largest valid setup passcode
pub const MAX_PASSCODE: u32 = 99_999_998;

/// Setup passcodes the protocol forbids
pub const INVALID_PASSCODES: [u32; 12] = [
    0, 11111111, 22222222, 33333333, 44444444, 55555555, 66666666, 77777777, 88888888,
    99999999, 12345678, 87654321,
];

/// Settings key holding the enabled device ids
pub const DEFAULT_SETTINGS_KEY: &str = "enabledDeviceIds";

/// Default bound on calls into the source platform and gateway
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 10_000;

/// Default capacity of each endpoint's inbound command channel
pub const DEFAULT_COMMAND_BUFFER: usize = 64;

/// Main configuration for the bridge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Protocol server node settings
    #[serde(default)]
    pub server: ServerNodeConfig,

    /// Engine tunables
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl BridgeConfig {
    /// Check the configuration for values the protocol would reject
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        if self.runtime.command_buffer == 0 {
            return Err(BridgeError::InvalidConfig(
                "runtime.command_buffer must be at least 1".into(),
            ));
        }
        if self.runtime.settings_key.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "runtime.settings_key must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Options handed to the gateway factory
    pub fn node_options(&self) -> ServerNodeOptions {
        ServerNodeOptions {
            command_buffer: self.runtime.command_buffer,
            ..self.server.to_options()
        }
    }
}

/// Protocol server node settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerNodeConfig {
    /// Stable node identity, usually the hub's id
    #[serde(default = "default_unique_id")]
    pub unique_id: String,

    /// Serial number (defaults to `bridge-{unique_id}`)
    #[serde(default)]
    pub serial_number: Option<String>,

    /// Node label shown by controllers
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Vendor name
    #[serde(default = "default_vendor_name")]
    pub vendor_name: String,

    /// Vendor id
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,

    /// Product name
    #[serde(default = "default_device_name")]
    pub product_name: String,

    /// Product id
    #[serde(default = "default_product_id")]
    pub product_id: u16,

    /// UDP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Setup passcode
    #[serde(default = "default_passcode")]
    pub passcode: u32,

    /// Discriminator
    #[serde(default = "default_discriminator")]
    pub discriminator: u16,

    /// Where the gateway keeps fabric and session state
    #[serde(default)]
    pub storage_location: Option<PathBuf>,
}

fn default_unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

fn default_vendor_name() -> String {
    DEFAULT_VENDOR_NAME.to_string()
}

fn default_vendor_id() -> u16 {
    DEFAULT_VENDOR_ID
}

fn default_product_id() -> u16 {
    DEFAULT_PRODUCT_ID
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_passcode() -> u32 {
    DEFAULT_PASSCODE
}

fn default_discriminator() -> u16 {
    DEFAULT_DISCRIMINATOR
}

impl Default for ServerNodeConfig {
    fn default() -> Self {
        Self {
            unique_id: default_unique_id(),
            serial_number: None,
            device_name: default_device_name(),
            vendor_name: default_vendor_name(),
            vendor_id: DEFAULT_VENDOR_ID,
            product_name: default_device_name(),
            product_id: DEFAULT_PRODUCT_ID,
            port: DEFAULT_PORT,
            passcode: DEFAULT_PASSCODE,
            discriminator: DEFAULT_DISCRIMINATOR,
            storage_location: None,
        }
    }
}

impl ServerNodeConfig {
    /// Check commissioning and network values
    pub fn validate(&self) -> Result<()> {
        if self.unique_id.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "server.unique_id must not be empty".into(),
            ));
        }
        if self.discriminator > MAX_DISCRIMINATOR {
            return Err(BridgeError::InvalidConfig(format!(
                "server.discriminator {} exceeds {}",
                self.discriminator, MAX_DISCRIMINATOR
            )));
        }
        if self.passcode > MAX_PASSCODE || INVALID_PASSCODES.contains(&self.passcode) {
            return Err(BridgeError::InvalidConfig(format!(
                "server.passcode {} is not a valid setup passcode",
                self.passcode
            )));
        }
        if self.port == 0 {
            return Err(BridgeError::InvalidConfig("server.port must not be 0".into()));
        }
        Ok(())
    }

    /// Effective serial number
    pub fn serial_number(&self) -> String {
        self.serial_number
            .clone()
            .unwrap_or_else(|| format!("bridge-{}", self.unique_id))
    }

    /// Resolve into the options handed to a gateway factory
    ///
    /// Identity strings are truncated to the protocol's label limit.
    pub fn to_options(&self) -> ServerNodeOptions {
        ServerNodeOptions {
            id: self.unique_id.clone(),
            network_port: self.port,
            passcode: self.passcode,
            discriminator: self.discriminator,
            storage_location: self.storage_location.clone(),
            command_buffer: DEFAULT_COMMAND_BUFFER,
            product_description: ProductDescription {
                name: truncate_label(&self.device_name),
                device_type: DeviceType::Aggregator,
            },
            basic_information: BasicInformation {
                vendor_name: truncate_label(&self.vendor_name),
                vendor_id: self.vendor_id,
                node_label: truncate_label(&self.product_name),
                product_name: truncate_label(&self.product_name),
                product_label: truncate_label(&self.product_name),
                product_id: self.product_id,
                serial_number: truncate_label(&self.serial_number()),
                unique_id: truncate_label(&self.unique_id),
            },
        }
    }
}

/// Resolved server node options
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerNodeOptions {
    /// Node id
    pub id: String,
    /// UDP port
    pub network_port: u16,
    /// Setup passcode
    pub passcode: u32,
    /// Discriminator
    pub discriminator: u16,
    /// Persistent storage path
    pub storage_location: Option<PathBuf>,
    /// Capacity of each endpoint's inbound command channel
    pub command_buffer: usize,
    /// Advertised product
    pub product_description: ProductDescription,
    /// Root BasicInformation cluster
    pub basic_information: BasicInformation,
}

/// Advertised product for commissioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductDescription {
    /// Product name
    pub name: String,
    /// Root device type
    pub device_type: DeviceType,
}

/// Root BasicInformation attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicInformation {
    /// vendorName
    pub vendor_name: String,
    /// vendorId
    pub vendor_id: u16,
    /// nodeLabel
    pub node_label: String,
    /// productName
    pub product_name: String,
    /// productLabel
    pub product_label: String,
    /// productId
    pub product_id: u16,
    /// serialNumber
    pub serial_number: String,
    /// uniqueId
    pub unique_id: String,
}

/// Engine tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Bound on each call into the source platform or gateway
    #[serde(with = "humantime_serde", default = "default_operation_timeout")]
    pub operation_timeout: Duration,

    /// Settings key for the enabled device set
    #[serde(default = "default_settings_key")]
    pub settings_key: String,

    /// Capacity of each endpoint's inbound command channel
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

fn default_operation_timeout() -> Duration {
    Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS)
}

fn default_settings_key() -> String {
    DEFAULT_SETTINGS_KEY.to_string()
}

fn default_command_buffer() -> usize {
    DEFAULT_COMMAND_BUFFER
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            operation_timeout: default_operation_timeout(),
            settings_key: default_settings_key(),
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

/// Builder for BridgeConfig
#[derive(Debug, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the node identity
    pub fn unique_id(mut self, id: impl Into<String>) -> Self {
        self.config.server.unique_id = id.into();
        self
    }

    /// Set the node label
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.config.server.device_name = name.into();
        self
    }

    /// Set the product name
    pub fn product_name(mut self, name: impl Into<String>) -> Self {
        self.config.server.product_name = name.into();
        self
    }

    /// Set the serial number
    pub fn serial_number(mut self, serial: impl Into<String>) -> Self {
        self.config.server.serial_number = Some(serial.into());
        self
    }

    /// Set the UDP port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Set the commissioning credentials
    pub fn commissioning(mut self, passcode: u32, discriminator: u16) -> Self {
        self.config.server.passcode = passcode;
        self.config.server.discriminator = discriminator;
        self
    }

    /// Set the gateway storage path
    pub fn storage_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.server.storage_location = Some(path.into());
        self
    }

    /// Set the per-operation timeout
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.runtime.operation_timeout = timeout;
        self
    }

    /// Set the settings key for the enabled device set
    pub fn settings_key(mut self, key: impl Into<String>) -> Self {
        self.config.runtime.settings_key = key.into();
        self
    }

    /// Set the inbound command channel capacity
    pub fn command_buffer(mut self, size: usize) -> Self {
        self.config.runtime.command_buffer = size;
        self
    }

    /// Build the configuration
    pub fn build(self) -> BridgeConfig {
        self.config
    }
}

// Custom serde module for Duration with humantime
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.passcode, 20202021);
        assert_eq!(config.server.discriminator, 3840);
        assert_eq!(config.server.vendor_id, 65521);
        assert_eq!(config.server.product_id, 32768);
        assert_eq!(config.runtime.settings_key, "enabledDeviceIds");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = BridgeConfigBuilder::new()
            .unique_id("hub-1")
            .port(5541)
            .operation_timeout(Duration::from_secs(2))
            .build();

        assert_eq!(config.server.port, 5541);
        assert_eq!(config.server.serial_number(), "bridge-hub-1");
        assert_eq!(config.runtime.operation_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_validate_rejects_bad_commissioning() {
        let config = BridgeConfigBuilder::new().commissioning(12345678, 3840).build();
        assert!(matches!(config.validate(), Err(BridgeError::InvalidConfig(_))));

        let config = BridgeConfigBuilder::new().commissioning(20202021, 5000).build();
        assert!(config.validate().is_err());

        let config = BridgeConfigBuilder::new().port(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_options_truncate_identity() {
        let config = BridgeConfigBuilder::new()
            .unique_id("hub")
            .device_name("A bridge with an unreasonably long node label")
            .build();

        let options = config.server.to_options();
        assert_eq!(options.product_description.name.len(), 32);
        assert!(options.product_description.name.ends_with("..."));
        assert_eq!(options.product_description.device_type, DeviceType::Aggregator);
        assert_eq!(options.basic_information.serial_number, "bridge-hub");
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{"server": {"unique_id": "abc", "port": 6000}, "runtime": {"operation_timeout": "250ms"}}"#;
        let config: BridgeConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.server.unique_id, "abc");
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.device_name, DEFAULT_DEVICE_NAME);
        assert_eq!(config.runtime.operation_timeout, Duration::from_millis(250));
        assert_eq!(config.runtime.command_buffer, DEFAULT_COMMAND_BUFFER);
    }
}
