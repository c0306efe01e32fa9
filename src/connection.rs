//! MQTT connection layer
//!
//! The [`Connection`] trait is the boundary between the subscription
//! machinery and the protocol client. [`RumqttConnection`] implements it on
//! top of `rumqttc`, driving the event loop on a background task, installing
//! message handlers and correlating broker acknowledgements with the
//! requests that caused them.

use std::future::Future;

use bytes::Bytes;
use rumqttc::QoS;
use thiserror::Error;

pub(crate) mod ack_tracker;
pub mod handlers;
pub mod publish;
pub mod rumqtt;

#[cfg(test)]
pub(crate) mod mock;

pub use handlers::{HandlerId, HandlerRegistry, MessageHandler};
pub use publish::{PublishAck, PublishOptions};
pub use rumqtt::RumqttConnection;

use crate::topic::TopicFilter;

/// Errors reported by a [`Connection`]
#[derive(Debug, Error)]
pub enum ConnectionError {
	/// The request could not be handed to the protocol client
	#[error("Client request failed: {0}")]
	Client(#[from] rumqttc::ClientError),

	/// Network failure while establishing the connection
	#[error("Network connection failed: {0}")]
	Network(#[from] rumqttc::ConnectionError),

	/// Broker refused the connection
	#[error("Broker rejected connection: {code:?}")]
	BrokerRejected {
		/// Return code of the CONNACK
		code: rumqttc::ConnectReturnCode,
	},

	/// Broker answered SUBACK with a failure code
	#[error("Broker rejected subscription to '{filter}'")]
	SubscribeRejected {
		/// First filter the broker refused
		filter: String,
	},

	/// Connection dropped before the broker acknowledged the request
	#[error("Connection interrupted before the request was acknowledged")]
	Interrupted,

	/// Connection is closed
	#[error("Connection closed")]
	Closed,
}

/// Protocol client operations needed by subscriptions and the client facade.
pub trait Connection: Send + Sync + 'static {
	/// Subscribes to `filters` and waits for the broker's acknowledgement.
	///
	/// On success `handler` is registered while the acknowledgement is being
	/// processed, before any later inbound message is dispatched, and its id
	/// is returned. On failure the handler is dropped unregistered.
	fn subscribe(
		&self,
		filters: &[TopicFilter],
		qos: QoS,
		handler: MessageHandler,
	) -> impl Future<Output = Result<HandlerId, ConnectionError>> + Send;

	/// Unsubscribes from `filters` and waits for the acknowledgement.
	fn unsubscribe(
		&self,
		filters: &[TopicFilter],
	) -> impl Future<Output = Result<(), ConnectionError>> + Send;

	/// Unregisters a message handler. Returns whether it was registered.
	fn remove_handler(&self, id: HandlerId) -> bool;

	/// Publishes a message and waits until its QoS flow completes.
	fn publish(
		&self,
		topic: &str,
		payload: Bytes,
		options: PublishOptions,
	) -> impl Future<Output = Result<PublishAck, ConnectionError>> + Send;

	/// Closes the connection. `force` skips the graceful DISCONNECT.
	fn end(&self, force: bool) -> impl Future<Output = ()> + Send;

	/// Whether the broker connection is currently established.
	fn is_connected(&self) -> bool;

	/// Whether the connection is trying to reconnect after a failure.
	fn is_reconnecting(&self) -> bool;
}
