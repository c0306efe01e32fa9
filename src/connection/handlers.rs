//! Registry of inbound message handlers

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rumqttc::QoS;
use tracing::trace;

use crate::message::Message;
use crate::topic::TopicFilter;

/// Callback invoked for every inbound message.
///
/// Runs on the connection's event loop task while the registry is locked:
/// it must not block and must not call back into the registry.
pub type MessageHandler = Box<dyn Fn(&Message) + Send + Sync>;

/// Identifier of a registered message handler.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl Display for HandlerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "HandlerId({})", self.0)
	}
}

struct HandlerEntry {
	filters: Vec<TopicFilter>,
	qos: QoS,
	handler: MessageHandler,
}

#[derive(Default)]
struct RegistryInner {
	next_id: u64,
	entries: BTreeMap<HandlerId, HandlerEntry>,
}

/// Message handlers of one connection, keyed by [`HandlerId`].
///
/// Each handler remembers the filters it was subscribed with, so the
/// connection can restore broker subscriptions after a session loss.
#[derive(Default)]
pub struct HandlerRegistry {
	inner: Mutex<RegistryInner>,
}

impl fmt::Debug for HandlerRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HandlerRegistry")
			.field("handlers", &self.len())
			.finish()
	}
}

impl HandlerRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, RegistryInner> {
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Registers a handler for the given subscription.
	pub fn insert(
		&self,
		filters: Vec<TopicFilter>,
		qos: QoS,
		handler: MessageHandler,
	) -> HandlerId {
		let mut inner = self.lock();
		let id = HandlerId(inner.next_id);
		inner.next_id += 1;
		inner.entries.insert(id, HandlerEntry {
			filters,
			qos,
			handler,
		});
		trace!(handler_id = %id, "Message handler registered");
		id
	}

	/// Unregisters a handler. Returns whether it was registered.
	pub fn remove(&self, id: HandlerId) -> bool {
		let removed = self.lock().entries.remove(&id).is_some();
		trace!(handler_id = %id, removed, "Message handler removal");
		removed
	}

	/// Invokes every handler, in registration order. Returns how many ran.
	pub fn dispatch(&self, message: &Message) -> usize {
		let inner = self.lock();
		for entry in inner.entries.values() {
			(entry.handler)(message);
		}
		inner.entries.len()
	}

	/// Filter sets of all registered handlers, with their QoS.
	pub fn subscriptions(&self) -> Vec<(Vec<TopicFilter>, QoS)> {
		self.lock()
			.entries
			.values()
			.map(|entry| (entry.filters.clone(), entry.qos))
			.collect()
	}

	/// Whether a handler is registered.
	pub fn contains(&self, id: HandlerId) -> bool {
		self.lock().entries.contains_key(&id)
	}

	/// Number of registered handlers.
	pub fn len(&self) -> usize {
		self.lock().entries.len()
	}

	/// Whether no handler is registered.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{Arc, Mutex};

	use rumqttc::{Publish, QoS};

	use super::*;

	fn recording_handler(log: &Arc<Mutex<Vec<String>>>, name: &str) -> MessageHandler {
		let log = Arc::clone(log);
		let name = name.to_string();
		Box::new(move |message: &Message| {
			log.lock().unwrap().push(format!("{name}:{}", message.topic));
		})
	}

	fn message(topic: &str) -> Message {
		Message::from(Publish::new(topic, QoS::AtMostOnce, b"x".to_vec()))
	}

	#[test]
	fn test_dispatch_runs_handlers_in_registration_order() {
		let registry = HandlerRegistry::new();
		let log = Arc::new(Mutex::new(Vec::new()));
		let filters = vec![TopicFilter::new("a/#").unwrap()];
		registry.insert(filters.clone(), QoS::AtLeastOnce, recording_handler(&log, "first"));
		registry.insert(filters, QoS::AtLeastOnce, recording_handler(&log, "second"));

		assert_eq!(registry.dispatch(&message("a/b")), 2);
		assert_eq!(*log.lock().unwrap(), vec!["first:a/b", "second:a/b"]);
	}

	#[test]
	fn test_removed_handler_is_not_invoked() {
		let registry = HandlerRegistry::new();
		let log = Arc::new(Mutex::new(Vec::new()));
		let id = registry.insert(
			vec![TopicFilter::new("a").unwrap()],
			QoS::AtMostOnce,
			recording_handler(&log, "gone"),
		);

		assert!(registry.remove(id));
		assert!(!registry.remove(id));
		assert!(!registry.contains(id));
		assert_eq!(registry.dispatch(&message("a")), 0);
		assert!(log.lock().unwrap().is_empty());
	}

	#[test]
	fn test_subscriptions_remember_filters_and_qos() {
		let registry = HandlerRegistry::new();
		let log = Arc::new(Mutex::new(Vec::new()));
		let filters = vec![
			TopicFilter::new("sensors/+/temp").unwrap(),
			TopicFilter::new("alerts/#").unwrap(),
		];
		registry.insert(filters.clone(), QoS::ExactlyOnce, recording_handler(&log, "h"));

		assert_eq!(registry.subscriptions(), vec![(filters, QoS::ExactlyOnce)]);
	}
}
