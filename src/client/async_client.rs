use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::config::MqttClientConfig;
use super::error::MqttClientError;
use crate::connection::{
	Connection, PublishAck, PublishOptions, RumqttConnection,
};
use crate::routing::{StopSignal, SubscribeOptions, Subscription};
use crate::topic::{TopicFilters, validation};

/// MQTT client handing out message streams.
///
/// Cloning is cheap; clones share the connection and the stop signal, so
/// closing any of them ends every subscription opened through any clone.
pub struct MqttClient<C: Connection = RumqttConnection> {
	connection: Arc<C>,
	stop: StopSignal,
	ended: Arc<OnceCell<()>>,
}

impl<C: Connection> Clone for MqttClient<C> {
	fn clone(&self) -> Self {
		Self {
			connection: Arc::clone(&self.connection),
			stop: self.stop.clone(),
			ended: Arc::clone(&self.ended),
		}
	}
}

impl MqttClient<RumqttConnection> {
	/// Connects using a broker URL such as
	/// `mqtt://localhost:1883?client_id=my-client`.
	///
	/// See [`connect_with_config`](Self::connect_with_config) for how long
	/// this waits.
	pub async fn connect(url: &str) -> Result<Self, MqttClientError> {
		let config = MqttClientConfig::from_url(url)?;
		Self::connect_with_config(config).await
	}

	/// Connects with explicit connection options and client settings.
	///
	/// Returns once the broker accepted the connection. There is no overall
	/// timeout: network errors are retried with the backoff of
	/// [`ClientSettings`](super::ClientSettings), and connecting fails with
	/// the last error after `max_consecutive_errors` consecutive failures.
	/// A broker refusing the connection fails immediately.
	pub async fn connect_with_config(
		config: MqttClientConfig,
	) -> Result<Self, MqttClientError> {
		config.settings.validate()?;
		let (host, port) = config.connection.broker_address();
		let connection =
			RumqttConnection::connect(config.connection, config.settings)
				.await
				.map_err(MqttClientError::Connect)?;
		info!(host = %host, port, "MQTT client connected");
		Ok(Self::with_connection(connection))
	}
}

impl<C: Connection> MqttClient<C> {
	/// Wraps an already established connection.
	pub fn with_connection(connection: C) -> Self {
		Self {
			connection: Arc::new(connection),
			stop: StopSignal::new(),
			ended: Arc::new(OnceCell::new()),
		}
	}

	/// Publishes with default options (QoS 1, not retained).
	pub async fn publish(
		&self,
		topic: &str,
		payload: impl Into<Bytes>,
	) -> Result<PublishAck, MqttClientError> {
		self.publish_with_options(topic, payload, PublishOptions::default())
			.await
	}

	/// Publishes and waits until the QoS flow of the message completes.
	pub async fn publish_with_options(
		&self,
		topic: &str,
		payload: impl Into<Bytes>,
		options: PublishOptions,
	) -> Result<PublishAck, MqttClientError> {
		if self.is_closed() {
			return Err(MqttClientError::ClientClosed);
		}
		validation::validate_publish_topic(topic)?;
		let payload = payload.into();
		debug!(topic = %topic, payload_size = payload.len(), qos = ?options.qos, "Publishing");
		self.connection
			.publish(topic, payload, options)
			.await
			.map_err(|source| MqttClientError::Publish {
				topic: topic.to_string(),
				source,
			})
	}

	/// Subscribes with default options: QoS 1, only messages matching one of
	/// `filters` are delivered.
	pub async fn subscribe(
		&self,
		filters: impl Into<TopicFilters>,
	) -> Result<Subscription<C>, MqttClientError> {
		self.subscribe_with_options(filters, SubscribeOptions::default())
			.await
	}

	/// Subscribes to one or more topic filters.
	///
	/// Returns once the broker acknowledged the subscription; from then on
	/// every routed message is queued for the returned [`Subscription`].
	pub async fn subscribe_with_options(
		&self,
		filters: impl Into<TopicFilters>,
		options: SubscribeOptions,
	) -> Result<Subscription<C>, MqttClientError> {
		if self.is_closed() {
			return Err(MqttClientError::ClientClosed);
		}
		let filters = filters.into().parse()?;
		Subscription::open(
			Arc::clone(&self.connection),
			filters,
			options,
			self.stop.clone(),
		)
		.await
	}

	/// Ends every subscription and closes the connection.
	///
	/// Open subscriptions observe the end on their next read and release
	/// themselves. `force` closes without sending a DISCONNECT. Only the
	/// first call ends the connection; later or concurrent calls, from any
	/// clone, wait until that has finished.
	pub async fn close(&self, force: bool) {
		if self.stop.is_triggered() {
			debug!("MQTT client already closed");
		}
		self.stop.trigger();
		self.ended
			.get_or_init(|| async {
				self.connection.end(force).await;
				info!(force, "MQTT client closed");
			})
			.await;
	}

	/// Underlying connection.
	pub fn connection(&self) -> &C {
		&self.connection
	}

	/// Whether [`close`](Self::close) was called.
	pub fn is_closed(&self) -> bool {
		self.stop.is_triggered()
	}

	/// Whether the broker connection is currently established.
	pub fn is_connected(&self) -> bool {
		self.connection.is_connected()
	}

	/// Whether the connection is trying to reconnect after a failure.
	pub fn is_reconnecting(&self) -> bool {
		self.connection.is_reconnecting()
	}
}

impl<C: Connection + std::fmt::Debug> std::fmt::Debug for MqttClient<C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MqttClient")
			.field("connection", &self.connection)
			.field("closed", &self.is_closed())
			.finish()
	}
}
