use rumqttc::OptionError;

use crate::connection::ConnectionError;
use crate::topic::TopicFilterError;

/// Errors that can occur in MQTT client operations
#[derive(Debug, thiserror::Error)]
pub enum MqttClientError {
	/// Configuration errors when parsing MQTT options
	#[error("Configuration error: {0}")]
	Configuration(#[from] OptionError),

	/// Invalid configuration parameter values
	#[error("Invalid configuration value: {0}")]
	ConfigurationValue(String),

	/// Connection establishment failed
	#[error("Failed to establish connection: {0}")]
	Connect(#[source] ConnectionError),

	/// Subscribe request failed or was rejected by the broker
	#[error("Failed to subscribe to {filters:?}: {source}")]
	Subscribe {
		/// Filters of the failed subscription
		filters: Vec<String>,
		/// Underlying connection error
		#[source]
		source: ConnectionError,
	},

	/// Unsubscribe request failed during subscription teardown
	#[error("Failed to unsubscribe from {filters:?}: {source}")]
	Unsubscribe {
		/// Filters of the subscription being torn down
		filters: Vec<String>,
		/// Underlying connection error
		#[source]
		source: ConnectionError,
	},

	/// Publish request failed
	#[error("Failed to publish to '{topic}': {source}")]
	Publish {
		/// Topic of the failed publish
		topic: String,
		/// Underlying connection error
		#[source]
		source: ConnectionError,
	},

	/// Invalid topic filter or publish topic
	#[error("Topic error: {0}")]
	TopicFilter(#[from] TopicFilterError),

	/// The client has been closed
	#[error("Client is closed")]
	ClientClosed,
}
