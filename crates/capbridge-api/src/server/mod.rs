//! REST API server
//!
//! This module provides the routes the settings UI calls.

pub mod error;
pub mod rest;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::AppState;

pub use error::ApiError;

/// Create the server router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(rest::health))
        // Bridge info
        .route("/api/info", get(rest::bridge_info))
        .route("/api/state", get(rest::get_state))
        .route("/api/stats", get(rest::get_stats))
        // Devices
        .route("/api/devices", get(rest::list_devices))
        .route("/api/devices/enable", post(rest::enable_device))
        .route("/api/devices/disable", post(rest::disable_device))
        .route("/api/entries", get(rest::list_entries))
        // CORS for the settings page
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
