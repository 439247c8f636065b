//! Error types for the bridge data model

use thiserror::Error;

/// Errors raised while interpreting device or endpoint data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A JSON value cannot be represented as a capability value
    #[error("Unsupported capability value: {0}")]
    UnsupportedValue(String),

    /// An unknown cluster name
    #[error("Unknown cluster: {0}")]
    UnknownCluster(String),

    /// A capability required by a translation is absent
    #[error("Missing capability: {0}")]
    MissingCapability(String),
}

impl ModelError {
    /// Get an error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            ModelError::UnsupportedValue(_) => "UNSUPPORTED_VALUE",
            ModelError::UnknownCluster(_) => "UNKNOWN_CLUSTER",
            ModelError::MissingCapability(_) => "MISSING_CAPABILITY",
        }
    }
}

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
