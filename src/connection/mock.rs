//! In-memory [`Connection`] for unit tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use rumqttc::{PubAck, PubComp, Publish, QoS};

use super::{
	Connection, ConnectionError, HandlerId, HandlerRegistry, MessageHandler,
	PublishAck, PublishOptions,
};
use crate::message::Message;
use crate::topic::TopicFilter;

fn names(filters: &[TopicFilter]) -> Vec<String> {
	filters.iter().map(TopicFilter::to_string).collect()
}

/// Records every call and dispatches injected messages to its handlers.
#[derive(Default)]
pub(crate) struct MockConnection {
	handlers: HandlerRegistry,
	subscribes: Mutex<Vec<(Vec<String>, QoS)>>,
	unsubscribes: Mutex<Vec<Vec<String>>>,
	unsubscribes_completed: Mutex<Vec<Vec<String>>>,
	unsubscribe_delay: Mutex<Option<Duration>>,
	end_delay: Mutex<Option<Duration>>,
	removed: Mutex<Vec<HandlerId>>,
	publishes: Mutex<Vec<(String, Bytes, PublishOptions)>>,
	ends: Mutex<Vec<bool>>,
	next_pkid: Mutex<u16>,
	fail_subscribe: AtomicBool,
	fail_unsubscribe: AtomicBool,
	fail_publish: AtomicBool,
	disconnected: AtomicBool,
	reconnecting: AtomicBool,
}

impl MockConnection {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Delivers a message as if it arrived from the broker.
	pub(crate) fn inject(&self, topic: &str, payload: &[u8]) -> usize {
		let message =
			Message::from(Publish::new(topic, QoS::AtLeastOnce, payload.to_vec()));
		self.handlers.dispatch(&message)
	}

	pub(crate) fn fail_subscribe(&self, fail: bool) {
		self.fail_subscribe.store(fail, Ordering::SeqCst);
	}

	pub(crate) fn fail_unsubscribe(&self, fail: bool) {
		self.fail_unsubscribe.store(fail, Ordering::SeqCst);
	}

	pub(crate) fn fail_publish(&self, fail: bool) {
		self.fail_publish.store(fail, Ordering::SeqCst);
	}

	/// Makes every unsubscribe take `delay` per filter.
	pub(crate) fn delay_unsubscribe(&self, delay: Duration) {
		*self.unsubscribe_delay.lock().unwrap() = Some(delay);
	}

	pub(crate) fn delay_end(&self, delay: Duration) {
		*self.end_delay.lock().unwrap() = Some(delay);
	}

	pub(crate) fn set_reconnecting(&self, reconnecting: bool) {
		self.reconnecting.store(reconnecting, Ordering::SeqCst);
	}

	pub(crate) fn handler_count(&self) -> usize {
		self.handlers.len()
	}

	pub(crate) fn subscribe_calls(&self) -> Vec<(Vec<String>, QoS)> {
		self.subscribes.lock().unwrap().clone()
	}

	pub(crate) fn unsubscribe_calls(&self) -> Vec<Vec<String>> {
		self.unsubscribes.lock().unwrap().clone()
	}

	/// Unsubscribes that ran to completion, successful or not.
	pub(crate) fn completed_unsubscribes(&self) -> Vec<Vec<String>> {
		self.unsubscribes_completed.lock().unwrap().clone()
	}

	pub(crate) fn removed_handlers(&self) -> Vec<HandlerId> {
		self.removed.lock().unwrap().clone()
	}

	pub(crate) fn publish_calls(&self) -> Vec<(String, Bytes, PublishOptions)> {
		self.publishes.lock().unwrap().clone()
	}

	pub(crate) fn end_calls(&self) -> Vec<bool> {
		self.ends.lock().unwrap().clone()
	}
}

impl Connection for MockConnection {
	async fn subscribe(
		&self,
		filters: &[TopicFilter],
		qos: QoS,
		handler: MessageHandler,
	) -> Result<HandlerId, ConnectionError> {
		self.subscribes.lock().unwrap().push((names(filters), qos));
		tokio::task::yield_now().await;
		if self.disconnected.load(Ordering::SeqCst) {
			return Err(ConnectionError::Closed);
		}
		if self.fail_subscribe.load(Ordering::SeqCst) {
			return Err(ConnectionError::SubscribeRejected {
				filter: filters[0].to_string(),
			});
		}
		Ok(self.handlers.insert(filters.to_vec(), qos, handler))
	}

	async fn unsubscribe(
		&self,
		filters: &[TopicFilter],
	) -> Result<(), ConnectionError> {
		self.unsubscribes.lock().unwrap().push(names(filters));
		let delay = *self.unsubscribe_delay.lock().unwrap();
		match delay {
			| Some(delay) => {
				for _ in filters {
					tokio::time::sleep(delay).await;
				}
			}
			| None => tokio::task::yield_now().await,
		}
		self.unsubscribes_completed.lock().unwrap().push(names(filters));
		if self.disconnected.load(Ordering::SeqCst) {
			return Err(ConnectionError::Closed);
		}
		if self.fail_unsubscribe.load(Ordering::SeqCst) {
			return Err(ConnectionError::Interrupted);
		}
		Ok(())
	}

	fn remove_handler(&self, id: HandlerId) -> bool {
		self.removed.lock().unwrap().push(id);
		self.handlers.remove(id)
	}

	async fn publish(
		&self,
		topic: &str,
		payload: Bytes,
		options: PublishOptions,
	) -> Result<PublishAck, ConnectionError> {
		self.publishes
			.lock()
			.unwrap()
			.push((topic.to_string(), payload, options));
		if self.fail_publish.load(Ordering::SeqCst)
			|| self.disconnected.load(Ordering::SeqCst)
		{
			return Err(ConnectionError::Closed);
		}
		let pkid = {
			let mut next = self.next_pkid.lock().unwrap();
			*next += 1;
			*next
		};
		Ok(match options.qos {
			| QoS::AtMostOnce => PublishAck::AtMostOnce,
			| QoS::AtLeastOnce => PublishAck::AtLeastOnce(PubAck::new(pkid)),
			| QoS::ExactlyOnce => PublishAck::ExactlyOnce(PubComp::new(pkid)),
		})
	}

	async fn end(&self, force: bool) {
		self.ends.lock().unwrap().push(force);
		let delay = *self.end_delay.lock().unwrap();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		self.disconnected.store(true, Ordering::SeqCst);
	}

	fn is_connected(&self) -> bool {
		!self.disconnected.load(Ordering::SeqCst)
			&& !self.reconnecting.load(Ordering::SeqCst)
	}

	fn is_reconnecting(&self) -> bool {
		self.reconnecting.load(Ordering::SeqCst)
	}
}
