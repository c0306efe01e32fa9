//! Correlation of broker acknowledgements with pending requests.
//!
//! `rumqttc` hands out packet ids only when a request leaves its event loop
//! (`Outgoing::*(pkid)`), so requests wait in FIFO order until the matching
//! outgoing event assigns them an id, then in a map until the acknowledgement
//! with that id arrives.

use std::collections::{HashMap, VecDeque};

use rumqttc::{PubAck, PubComp, QoS, SubAck, SubscribeReasonCode};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::handlers::{HandlerId, HandlerRegistry, MessageHandler};
use super::publish::PublishAck;
use super::ConnectionError;
use crate::topic::TopicFilter;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, ConnectionError>>;

/// Identifies a queued request until it is sent.
pub(crate) type Ticket = u64;

pub(crate) struct PendingSubscribe {
	pub filters: Vec<TopicFilter>,
	pub qos: QoS,
	/// Installed on a successful SUBACK. `None` for resubscriptions of
	/// handlers that are already registered.
	pub handler: Option<MessageHandler>,
	pub reply: Reply<Option<HandlerId>>,
}

pub(crate) struct PendingPublish {
	pub qos: QoS,
	pub reply: Reply<PublishAck>,
}

pub(crate) type PendingUnsubscribe = Reply<()>;

/// Queue of requests awaiting a packet id, plus requests awaiting an ack.
pub(crate) struct Correlator<P> {
	queued: VecDeque<(Ticket, P)>,
	inflight: HashMap<u16, P>,
	next_ticket: Ticket,
}

impl<P> Default for Correlator<P> {
	fn default() -> Self {
		Self {
			queued: VecDeque::new(),
			inflight: HashMap::new(),
			next_ticket: 0,
		}
	}
}

impl<P> Correlator<P> {
	pub fn enqueue(&mut self, pending: P) -> Ticket {
		let ticket = self.next_ticket;
		self.next_ticket += 1;
		self.queued.push_back((ticket, pending));
		ticket
	}

	/// Withdraws a request that never reached the protocol client.
	pub fn cancel(&mut self, ticket: Ticket) -> Option<P> {
		let position = self.queued.iter().position(|(t, _)| *t == ticket)?;
		self.queued.remove(position).map(|(_, pending)| pending)
	}

	/// Assigns `pkid` to the oldest queued request.
	///
	/// A `pkid` that is already in flight is a retransmission and leaves the
	/// queue untouched.
	pub fn sent(&mut self, pkid: u16) -> bool {
		if self.inflight.contains_key(&pkid) {
			return false;
		}
		match self.queued.pop_front() {
			| Some((_, pending)) => {
				self.inflight.insert(pkid, pending);
				true
			}
			| None => false,
		}
	}

	/// Removes the oldest queued request without assigning an id.
	pub fn pop_queued(&mut self) -> Option<P> {
		self.queued.pop_front().map(|(_, pending)| pending)
	}

	pub fn complete(&mut self, pkid: u16) -> Option<P> {
		self.inflight.remove(&pkid)
	}

	pub fn take_inflight(&mut self) -> Vec<P> {
		self.inflight.drain().map(|(_, pending)| pending).collect()
	}

	pub fn take_all(&mut self) -> Vec<P> {
		let mut all = self.take_inflight();
		all.extend(self.queued.drain(..).map(|(_, pending)| pending));
		all
	}

	#[cfg(test)]
	pub fn queued_len(&self) -> usize {
		self.queued.len()
	}

	#[cfg(test)]
	pub fn inflight_len(&self) -> usize {
		self.inflight.len()
	}
}

/// Pending subscribe, unsubscribe and publish requests of one connection.
#[derive(Default)]
pub(crate) struct AckTracker {
	pub subscribes: Correlator<PendingSubscribe>,
	pub unsubscribes: Correlator<PendingUnsubscribe>,
	pub publishes: Correlator<PendingPublish>,
}

impl AckTracker {
	pub fn subscribe_acked(&mut self, ack: &SubAck, handlers: &HandlerRegistry) {
		let Some(pending) = self.subscribes.complete(ack.pkid) else {
			warn!(pkid = ack.pkid, "SUBACK for unknown subscribe request");
			return;
		};
		let rejected = ack
			.return_codes
			.iter()
			.zip(&pending.filters)
			.find(|(code, _)| matches!(code, SubscribeReasonCode::Failure))
			.map(|(_, filter)| filter.to_string());
		let result = match rejected {
			| Some(filter) => {
				Err(ConnectionError::SubscribeRejected { filter })
			}
			| None => Ok(pending.handler.map(|handler| {
				handlers.insert(pending.filters, pending.qos, handler)
			})),
		};
		if let Err(Ok(Some(id))) = pending.reply.send(result) {
			// Nobody waits for this subscription anymore.
			handlers.remove(id);
			warn!(
				handler_id = %id,
				pkid = ack.pkid,
				"Subscriber went away before SUBACK, handler removed"
			);
		}
	}

	pub fn unsubscribe_acked(&mut self, pkid: u16) {
		match self.unsubscribes.complete(pkid) {
			| Some(reply) => {
				let _ = reply.send(Ok(()));
			}
			| None => {
				warn!(pkid, "UNSUBACK for unknown unsubscribe request");
			}
		}
	}

	pub fn publish_sent(&mut self, pkid: u16) {
		if pkid == 0 {
			// QoS 0 has no acknowledgement: done once written.
			if let Some(pending) = self.publishes.pop_queued() {
				debug_assert_eq!(pending.qos, QoS::AtMostOnce);
				let _ = pending.reply.send(Ok(PublishAck::AtMostOnce));
			}
		} else if !self.publishes.sent(pkid) {
			debug!(pkid, "Publish retransmitted");
		}
	}

	pub fn publish_acked(&mut self, ack: PubAck) {
		match self.publishes.complete(ack.pkid) {
			| Some(pending) => {
				let _ = pending.reply.send(Ok(PublishAck::AtLeastOnce(ack)));
			}
			| None => warn!(pkid = ack.pkid, "PUBACK for unknown publish"),
		}
	}

	pub fn publish_completed(&mut self, comp: PubComp) {
		match self.publishes.complete(comp.pkid) {
			| Some(pending) => {
				let _ = pending.reply.send(Ok(PublishAck::ExactlyOnce(comp)));
			}
			| None => warn!(pkid = comp.pkid, "PUBCOMP for unknown publish"),
		}
	}

	/// Fails subscribe and unsubscribe requests lost with the network link.
	///
	/// In-flight publishes are kept: `rumqttc` retransmits them after
	/// reconnecting.
	pub fn interrupt(&mut self) {
		let subscribes = self.subscribes.take_inflight();
		let unsubscribes = self.unsubscribes.take_inflight();
		if !subscribes.is_empty() || !unsubscribes.is_empty() {
			debug!(
				subscribes = subscribes.len(),
				unsubscribes = unsubscribes.len(),
				"Failing requests interrupted by connection loss"
			);
		}
		for pending in subscribes {
			let _ = pending.reply.send(Err(ConnectionError::Interrupted));
		}
		for reply in unsubscribes {
			let _ = reply.send(Err(ConnectionError::Interrupted));
		}
	}

	/// Fails every pending request: the event loop is gone.
	pub fn close(&mut self) {
		for pending in self.subscribes.take_all() {
			let _ = pending.reply.send(Err(ConnectionError::Closed));
		}
		for reply in self.unsubscribes.take_all() {
			let _ = reply.send(Err(ConnectionError::Closed));
		}
		for pending in self.publishes.take_all() {
			let _ = pending.reply.send(Err(ConnectionError::Closed));
		}
	}
}
