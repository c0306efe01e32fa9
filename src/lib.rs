//! # MQTT Stream Client
//!
//! An async MQTT client that delivers subscriptions as message streams.
//!
//! ## Features
//!
//! - **Message Streams**: Each subscription is a FIFO stream of messages,
//!   consumable with `next().await` or as a `futures::Stream`
//! - **Wildcard Routing**: Messages are delivered only to subscriptions with
//!   a matching filter (`+` single level, `#` multi level)
//! - **Deterministic Teardown**: Closing, dropping or stopping a subscription
//!   unsubscribes and removes its handler exactly once
//! - **Acknowledged Requests**: Subscribe, unsubscribe and publish resolve
//!   only once the broker acknowledged them
//! - **Client-wide Stop**: Closing the client ends every open subscription
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mqtt_stream_client::{MqttClient, QoS, SubscribeOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client =
//!         MqttClient::connect("mqtt://localhost:1883?client_id=quick-start")
//!             .await?;
//!
//!     let mut readings = client
//!         .subscribe_with_options(
//!             ["sensors/+/temp", "alerts/#"],
//!             SubscribeOptions::default().with_qos(QoS::AtLeastOnce),
//!         )
//!         .await?;
//!
//!     client.publish("sensors/kitchen/temp", "21.5").await?;
//!
//!     if let Some(message) = readings.next().await {
//!         let message = message?;
//!         println!("{}: {:?}", message.topic, message.payload_str());
//!     }
//!
//!     readings.close().await?;
//!     client.close(false).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Pattern Matching
//!
//! - `+` matches exactly one topic level (`sensors/+/temp`)
//! - `#` matches the parent level and everything below it (`sensors/#`
//!   matches `sensors`, `sensors/a` and `sensors/a/b`)

#![warn(missing_docs)]

// Core modules
pub mod client;
pub mod connection;
pub mod message;
pub mod routing;
pub mod topic;

// === Core Public API ===
pub use client::{ClientSettings, MqttClient, MqttClientConfig, MqttClientError};
pub use message::Message;
pub use routing::{MessageRouting, SessionState, SubscribeOptions, Subscription};

// Publishing
pub use connection::{PublishAck, PublishOptions};

// Essential external types
pub use rumqttc::{MqttOptions, QoS};

// === Advanced API ===
pub use connection::{Connection, ConnectionError, RumqttConnection};
pub use routing::{ConcurrentQueue, Drain, QueueProducer, StopSignal};
pub use topic::{TopicFilter, TopicFilterError, TopicFilters, matches};

/// Result type alias for operations that may fail with MqttClientError
pub type Result<T> = std::result::Result<T, MqttClientError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use mqtt_stream_client::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for most MQTT applications

	pub use crate::{
		Message, MqttClient, MqttClientConfig, MqttClientError,
		PublishOptions, QoS, Result, SubscribeOptions, Subscription,
	};
}

/// Error types used throughout the library
///
/// ```rust
/// use mqtt_stream_client::errors::*;
/// ```
pub mod errors {
	//! All error types used in the library

	pub use crate::{ConnectionError, MqttClientError, TopicFilterError};
}
