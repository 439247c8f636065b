//! Error types for the settings persistence layer

use capbridge_engine::BridgeError;
use thiserror::Error;

/// Errors that can occur in settings operations
#[derive(Error, Debug)]
pub enum StateError {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored value is not valid JSON
    #[error("Deserialization error for key {key}: {reason}")]
    Deserialization { key: String, reason: String },

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StateError {
    /// Get error code for logging and metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            StateError::Database(_) => "STATE_DATABASE",
            StateError::Connection(_) => "STATE_CONNECTION",
            StateError::Serialization(_) => "STATE_SERIALIZATION",
            StateError::Deserialization { .. } => "STATE_DESERIALIZATION",
            StateError::InvalidData(_) => "STATE_INVALID_DATA",
        }
    }
}

impl From<sqlx::Error> for StateError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StateError::Connection(err.to_string())
            }
            sqlx::Error::Database(db_err) => StateError::Database(db_err.to_string()),
            _ => StateError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

impl From<StateError> for BridgeError {
    fn from(err: StateError) -> Self {
        BridgeError::Settings(err.to_string())
    }
}

/// Result type for settings operations
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(StateError::Database("x".into()).error_code(), "STATE_DATABASE");
        assert_eq!(
            StateError::Deserialization {
                key: "k".into(),
                reason: "eof".into()
            }
            .error_code(),
            "STATE_DESERIALIZATION"
        );
    }

    #[test]
    fn test_into_bridge_error() {
        let err: BridgeError = StateError::Connection("pool closed".into()).into();
        assert!(matches!(err, BridgeError::Settings(ref msg) if msg.contains("pool closed")));
    }

    #[test]
    fn test_pool_closed_is_connection_error() {
        let err: StateError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, StateError::Connection(_)));
    }
}
