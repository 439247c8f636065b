//! Capbridge State - Settings persistence
//!
//! This crate provides a SQLite-backed [`SettingsStore`](capbridge_engine::SettingsStore)
//! so the set of bridged devices survives restarts.
//!
//! ## Components
//!
//! - **storage**: SQLite-based persistence with sqlx
//! - **error**: State-specific error types
//!
//! ## Example
//!
//! ```ignore
//! use capbridge_state::SqliteSettings;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Arc::new(SqliteSettings::new("capbridge.db").await?);
//!     let manager = BridgeManager::new(config, platform, gateways, settings);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod storage;

// Re-exports for convenience
pub use error::{Result, StateError};
pub use storage::SqliteSettings;
