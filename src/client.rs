//! MQTT client module
//!
//! This module provides the high-level client: connection setup, publishing
//! and subscriptions delivered as message streams.

/// Asynchronous MQTT client implementation
pub mod async_client;
/// Client configuration
pub mod config;
/// Client error types
pub mod error;


// Re-export commonly used types for convenience
pub use async_client::MqttClient;
pub use config::{ClientSettings, MqttClientConfig};
pub use error::MqttClientError;
