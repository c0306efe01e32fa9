//! Publish options and acknowledgements

use rumqttc::{PubAck, PubComp, QoS};

/// Options for a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
	/// Quality of service (default `AtLeastOnce`)
	pub qos: QoS,
	/// Whether the broker should retain the message
	pub retain: bool,
}

impl Default for PublishOptions {
	fn default() -> Self {
		Self {
			qos: QoS::AtLeastOnce,
			retain: false,
		}
	}
}

impl PublishOptions {
	/// Sets the quality of service.
	pub fn with_qos(self, qos: QoS) -> Self {
		Self { qos, ..self }
	}

	/// Sets the retain flag.
	pub fn with_retain(self, retain: bool) -> Self {
		Self { retain, ..self }
	}
}

/// Completion of a publish, depending on its QoS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishAck {
	/// QoS 0: written to the network, no acknowledgement exists
	AtMostOnce,
	/// QoS 1: broker answered with PUBACK
	AtLeastOnce(PubAck),
	/// QoS 2: broker finished the flow with PUBCOMP
	ExactlyOnce(PubComp),
}

impl PublishAck {
	/// Packet identifier of the acknowledged publish (0 for QoS 0).
	pub fn pkid(&self) -> u16 {
		match self {
			| PublishAck::AtMostOnce => 0,
			| PublishAck::AtLeastOnce(ack) => ack.pkid,
			| PublishAck::ExactlyOnce(comp) => comp.pkid,
		}
	}
}
