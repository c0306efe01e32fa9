//! Inbound MQTT message type

use bytes::Bytes;
use rumqttc::{Publish, QoS};

/// Message received on a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
	/// Topic the message was published on.
	pub topic: String,
	/// Raw payload.
	pub payload: Bytes,
	/// The PUBLISH packet the message arrived in (QoS, retain, dup, packet id).
	pub packet: Publish,
}

impl Message {
	/// Quality of service the message was delivered with.
	pub fn qos(&self) -> QoS {
		self.packet.qos
	}

	/// Whether the broker delivered a retained message.
	pub fn is_retained(&self) -> bool {
		self.packet.retain
	}

	/// Payload as UTF-8, if valid.
	pub fn payload_str(&self) -> Option<&str> {
		std::str::from_utf8(&self.payload).ok()
	}
}

impl From<Publish> for Message {
	fn from(packet: Publish) -> Self {
		Self {
			topic: packet.topic.clone(),
			payload: packet.payload.clone(),
			packet,
		}
	}
}
