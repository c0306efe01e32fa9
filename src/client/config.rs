//! Configuration for MQTT client initialization

use std::time::Duration;

use rumqttc::{MqttOptions, OptionError};

use super::error::MqttClientError;

/// Client-level behavior settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
	/// Capacity of the rumqttc request channel (must be > 0)
	pub event_loop_capacity: usize,
	/// Consecutive network errors after which the event loop gives up
	/// (must be > 0)
	pub max_consecutive_errors: u32,
	/// Delay before the first reconnection attempt
	pub initial_retry_delay: Duration,
	/// Upper bound for the exponential reconnection backoff
	pub max_retry_delay: Duration,
}

impl Default for ClientSettings {
	fn default() -> Self {
		Self {
			event_loop_capacity: 10,
			max_consecutive_errors: 10,
			initial_retry_delay: Duration::from_millis(100),
			max_retry_delay: Duration::from_secs(30),
		}
	}
}

impl ClientSettings {
	/// Backoff before retry number `error_count` (starting at 1).
	pub fn retry_delay(&self, error_count: u32) -> Duration {
		let exponent = error_count.saturating_sub(1).min(10);
		self.initial_retry_delay
			.saturating_mul(2_u32.pow(exponent))
			.min(self.max_retry_delay)
	}

	/// Checks that every value is usable.
	pub fn validate(&self) -> Result<(), MqttClientError> {
		if self.event_loop_capacity == 0 {
			return Err(MqttClientError::ConfigurationValue(
				"event_loop_capacity must be greater than 0".to_string(),
			));
		}
		if self.max_consecutive_errors == 0 {
			return Err(MqttClientError::ConfigurationValue(
				"max_consecutive_errors must be greater than 0".to_string(),
			));
		}
		if self.initial_retry_delay > self.max_retry_delay {
			return Err(MqttClientError::ConfigurationValue(
				"initial_retry_delay must not exceed max_retry_delay"
					.to_string(),
			));
		}
		Ok(())
	}
}

/// Configuration for MQTT client creation
#[derive(Debug, Clone)]
pub struct MqttClientConfig {
	/// Underlying MQTT connection options (from rumqttc)
	pub connection: MqttOptions,
	/// Client-level behavior settings
	pub settings: ClientSettings,
}

impl MqttClientConfig {
	/// Create config with default settings
	pub fn new(client_id: &str, host: &str, port: u16) -> Self {
		Self {
			connection: MqttOptions::new(client_id, host, port),
			settings: ClientSettings::default(),
		}
	}

	/// Parse configuration from MQTT URL
	///
	/// Supports: tcp://, mqtt://, ssl://, mqtts://, ws://, wss://.
	/// The `client_id` query parameter is required.
	pub fn from_url(url: &str) -> Result<Self, OptionError> {
		Ok(Self {
			connection: MqttOptions::parse_url(url)?,
			settings: ClientSettings::default(),
		})
	}

	/// Create config for localhost:1883
	pub fn localhost(client_id: &str) -> Self {
		Self::new(client_id, "localhost", 1883)
	}

	/// Replace the client-level settings
	pub fn with_settings(mut self, settings: ClientSettings) -> Self {
		self.settings = settings;
		self
	}
}
