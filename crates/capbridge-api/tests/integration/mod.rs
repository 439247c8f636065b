//! Integration tests for the management API

mod error_responses;
mod rest_handlers;
