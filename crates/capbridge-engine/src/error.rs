//! Error types for bridge operations
//!
//! Only caller-invoked operations (`start`, `enable_device`,
//! `disable_device`, `get_state`) return these to their caller. Every
//! event-driven path (capability callbacks, inbound commands, outbound
//! writes) turns them into log records instead.

use capbridge_core::{CapabilityValue, DeviceId, EndpointId, ModelError};
use thiserror::Error;

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    // ===== Caller Errors =====
    /// Device id is not in the source catalog
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceId),

    /// `start()` was called twice
    #[error("Bridge is already started")]
    AlreadyStarted,

    /// Operation requires a started bridge
    #[error("Bridge is not started")]
    NotStarted,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ===== Lifecycle Errors =====
    /// The protocol server node could not be created or started
    #[error("Failed to create protocol server node: {0}")]
    GatewayCreation(String),

    /// An endpoint could not be synthesized or registered
    #[error("Failed to synthesize endpoint for device {device_id}: {reason}")]
    SynthesisFailure {
        /// Device being bridged
        device_id: DeviceId,
        /// Failure reason
        reason: String,
    },

    // ===== Event-path Errors =====
    /// A write to a source device failed
    #[error("Failed to set {capability_id} to {value} on device {device_id}: {reason}")]
    CapabilityWriteFailure {
        /// Target device
        device_id: DeviceId,
        /// Target capability
        capability_id: String,
        /// Value that was being written
        value: CapabilityValue,
        /// Failure reason
        reason: String,
    },

    /// A capability-change handler failed or panicked
    #[error("Capability callback failed for {capability_id} on device {device_id}: {reason}")]
    SubscriptionCallbackFailure {
        /// Device that emitted the change
        device_id: DeviceId,
        /// Capability that changed
        capability_id: String,
        /// Failure reason
        reason: String,
    },

    /// An inbound command has no capability to land on
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),

    /// Endpoint is not present in the gateway's tree
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(EndpointId),

    // ===== Collaborator Errors =====
    /// Source platform failure
    #[error("Source platform error: {0}")]
    Source(String),

    /// Protocol gateway failure
    #[error("Protocol gateway error: {0}")]
    Gateway(String),

    /// Settings persistence failure
    #[error("Settings error: {0}")]
    Settings(String),

    /// A bounded wait elapsed
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: &'static str,
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    // ===== Wrapped Errors =====
    /// Model error
    #[error(transparent)]
    Model(#[from] ModelError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Check if this error was caused by the caller's input
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            BridgeError::DeviceNotFound(_)
                | BridgeError::AlreadyStarted
                | BridgeError::NotStarted
                | BridgeError::InvalidConfig(_)
        )
    }

    /// Check if this error is recoverable/retriable
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout { .. } | BridgeError::Source(_) | BridgeError::Gateway(_)
        )
    }

    /// Get an error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            BridgeError::AlreadyStarted => "ALREADY_STARTED",
            BridgeError::NotStarted => "NOT_STARTED",
            BridgeError::InvalidConfig(_) => "INVALID_CONFIG",
            BridgeError::GatewayCreation(_) => "GATEWAY_CREATION",
            BridgeError::SynthesisFailure { .. } => "SYNTHESIS_FAILURE",
            BridgeError::CapabilityWriteFailure { .. } => "CAPABILITY_WRITE_FAILURE",
            BridgeError::SubscriptionCallbackFailure { .. } => "SUBSCRIPTION_CALLBACK_FAILURE",
            BridgeError::UnsupportedCommand(_) => "UNSUPPORTED_COMMAND",
            BridgeError::EndpointNotFound(_) => "ENDPOINT_NOT_FOUND",
            BridgeError::Source(_) => "SOURCE_ERROR",
            BridgeError::Gateway(_) => "GATEWAY_ERROR",
            BridgeError::Settings(_) => "SETTINGS_ERROR",
            BridgeError::Timeout { .. } => "TIMEOUT",
            BridgeError::Model(_) => "MODEL_ERROR",
            BridgeError::Json(_) => "JSON_ERROR",
        }
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = BridgeError::DeviceNotFound(DeviceId::from("d1"));
        assert_eq!(err.error_code(), "DEVICE_NOT_FOUND");
        assert!(err.to_string().contains("d1"));
    }

    #[test]
    fn test_caller_errors() {
        assert!(BridgeError::AlreadyStarted.is_caller_error());
        assert!(BridgeError::DeviceNotFound("x".into()).is_caller_error());
        assert!(!BridgeError::Gateway("boom".into()).is_caller_error());
    }

    #[test]
    fn test_is_retriable() {
        assert!(BridgeError::Timeout {
            operation: "set_capability_value",
            duration_ms: 10_000
        }
        .is_retriable());
        assert!(!BridgeError::AlreadyStarted.is_retriable());
    }

    #[test]
    fn test_write_failure_context() {
        let err = BridgeError::CapabilityWriteFailure {
            device_id: "lamp".into(),
            capability_id: "dim".to_string(),
            value: CapabilityValue::Number(0.5),
            reason: "offline".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("lamp"));
        assert!(text.contains("dim"));
        assert!(text.contains("0.5"));
    }

    #[test]
    fn test_model_error_conversion() {
        let err: BridgeError = ModelError::MissingCapability("dim".into()).into();
        assert_eq!(err.error_code(), "MODEL_ERROR");
    }
}
