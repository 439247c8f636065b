//! Protocol gateway abstraction
//!
//! The gateway owns the protocol server node and its aggregator. The
//! bridge adds one endpoint per bridged device, pushes attribute patches to
//! it, and drains the commands controllers invoke on it.

use async_trait::async_trait;
use capbridge_core::{
    attr, transform::truncate_label, AttributeSnapshot, ClusterId, Device, DeviceType, EndpointId,
    EndpointShape, InboundCommand,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::ServerNodeOptions;
use crate::error::Result;

/// Id of the aggregator endpoint under which bridged endpoints live
pub const AGGREGATOR_ENDPOINT_ID: &str = "aggregator";

/// Everything the gateway needs to add a bridged endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointDescriptor {
    /// Endpoint id, unique under the aggregator
    pub id: EndpointId,
    /// Device type
    pub device_type: DeviceType,
    /// Clusters, BridgedDeviceBasicInformation first
    pub clusters: Vec<ClusterId>,
    /// Initial attribute values for every cluster
    pub attributes: AttributeSnapshot,
}

impl EndpointDescriptor {
    /// Describe a bridged endpoint for `device` with the given shape
    pub fn bridged(device: &Device, shape: &EndpointShape) -> Self {
        let mut clusters = Vec::with_capacity(shape.clusters.len() + 1);
        clusters.push(ClusterId::BridgedDeviceBasicInformation);
        clusters.extend(
            shape
                .clusters
                .iter()
                .copied()
                .filter(|c| *c != ClusterId::BridgedDeviceBasicInformation),
        );

        let mut attributes = basic_information(device);
        attributes.merge(&shape.attributes);

        Self {
            id: EndpointId(device.id.to_string()),
            device_type: shape.device_type,
            clusters,
            attributes,
        }
    }
}

/// BridgedDeviceBasicInformation attributes for a device
pub fn basic_information(device: &Device) -> AttributeSnapshot {
    let label = truncate_label(&device.name);
    AttributeSnapshot::new()
        .with(ClusterId::BridgedDeviceBasicInformation, attr::NODE_LABEL, label.clone())
        .with(ClusterId::BridgedDeviceBasicInformation, attr::PRODUCT_NAME, label.clone())
        .with(ClusterId::BridgedDeviceBasicInformation, attr::PRODUCT_LABEL, label)
        .with(
            ClusterId::BridgedDeviceBasicInformation,
            attr::SERIAL_NUMBER,
            truncate_label(device.id.as_str()),
        )
        .with(ClusterId::BridgedDeviceBasicInformation, attr::REACHABLE, device.available)
}

/// A registered endpoint and the receiving side of its command channel
#[derive(Debug)]
pub struct EndpointRegistration {
    /// Endpoint id
    pub id: EndpointId,
    /// Commands invoked by controllers
    pub commands: mpsc::Receiver<InboundCommand>,
}

/// Commissioning state of the server node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissioningStatus {
    /// At least one fabric has commissioned the node
    pub commissioned: bool,
    /// QR setup payload (`MT:...`)
    pub qr_pairing_code: String,
    /// Manual pairing code
    pub manual_pairing_code: String,
}

/// Connection state of the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayState {
    /// Created, not yet started
    Created,
    /// Serving the protocol
    Online,
    /// Shut down
    Offline,
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayState::Created => write!(f, "Created"),
            GatewayState::Online => write!(f, "Online"),
            GatewayState::Offline => write!(f, "Offline"),
        }
    }
}

/// A running protocol server node
#[async_trait]
pub trait ProtocolGateway: Send + Sync {
    /// Start serving; the aggregator endpoint already exists
    async fn start(&self) -> Result<()>;

    /// Add a bridged endpoint under the aggregator
    async fn add_endpoint(&self, endpoint: EndpointDescriptor) -> Result<EndpointRegistration>;

    /// Remove a bridged endpoint
    async fn remove_endpoint(&self, id: &EndpointId) -> Result<()>;

    /// Apply an attribute patch to an endpoint
    async fn set_attributes(&self, id: &EndpointId, patch: AttributeSnapshot) -> Result<()>;

    /// Current commissioning state
    fn commissioning_status(&self) -> CommissioningStatus;

    /// Current connection state
    fn state(&self) -> GatewayState;

    /// Stop serving
    async fn shutdown(&self) -> Result<()>;
}

/// Creates the server node with its aggregator
#[async_trait]
pub trait GatewayFactory: Send + Sync {
    /// Create a gateway; failure is fatal to `start`
    async fn create(&self, options: &ServerNodeOptions) -> Result<Arc<dyn ProtocolGateway>>;
}
