//! Subscription sessions delivered as message streams

use std::fmt::{self, Display};
use std::sync::Arc;

use futures::Stream;
use rumqttc::QoS;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, warn};

use super::queue::{ConcurrentQueue, Drain, QueueProducer};
use super::stop_signal::StopSignal;
use crate::client::MqttClientError;
use crate::connection::{Connection, ConnectionError, HandlerId, MessageHandler};
use crate::message::Message;
use crate::topic::TopicFilter;

/// Which inbound messages a subscription receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageRouting {
	/// Only messages whose topic matches one of the subscription's filters.
	#[default]
	MatchingFilters,
	/// Every message arriving on the connection, whatever its topic.
	Everything,
}

/// Subscription options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOptions {
	/// Requested quality of service (default `AtLeastOnce`)
	pub qos: QoS,
	/// Message routing (default `MatchingFilters`)
	pub routing: MessageRouting,
}

impl Default for SubscribeOptions {
	fn default() -> Self {
		Self {
			qos: QoS::AtLeastOnce,
			routing: MessageRouting::default(),
		}
	}
}

impl SubscribeOptions {
	/// Set QoS level
	pub fn with_qos(self, qos: QoS) -> Self {
		Self { qos, ..self }
	}

	/// Set message routing
	pub fn with_routing(self, routing: MessageRouting) -> Self {
		Self { routing, ..self }
	}

	/// Receive every message of the connection, unchecked.
	pub fn unfiltered(self) -> Self {
		self.with_routing(MessageRouting::Everything)
	}

	/// `true` checks every received topic against all of the subscription's
	/// filters and keeps the ones matching any of them. `false` forwards
	/// every message of the connection unchecked.
	pub fn with_receive_all_topics(self, receive_all_topics: bool) -> Self {
		if receive_all_topics {
			self.with_routing(MessageRouting::MatchingFilters)
		} else {
			self.with_routing(MessageRouting::Everything)
		}
	}
}

/// Lifecycle of a subscription session.
///
/// `Idle → Subscribing → Active → Draining → Closed`; a failed subscribe
/// goes from `Subscribing` straight to `Closed`. A [`Subscription`] exists
/// only from `Active` on, so `Idle` and `Subscribing` show up only in the
/// `state` field of the setup log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	/// Nothing requested yet
	Idle,
	/// Waiting for the broker to acknowledge the subscribe
	Subscribing,
	/// Handler installed, messages are delivered
	Active,
	/// Teardown in progress
	Draining,
	/// Terminal
	Closed,
}

impl Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			| SessionState::Idle => "idle",
			| SessionState::Subscribing => "subscribing",
			| SessionState::Active => "active",
			| SessionState::Draining => "draining",
			| SessionState::Closed => "closed",
		};
		f.write_str(name)
	}
}

fn filter_names(filters: &[TopicFilter]) -> Vec<String> {
	filters.iter().map(TopicFilter::to_string).collect()
}

fn message_handler(
	producer: QueueProducer<Message>,
	filters: &[TopicFilter],
	routing: MessageRouting,
) -> MessageHandler {
	match routing {
		| MessageRouting::MatchingFilters => {
			let filters = filters.to_vec();
			Box::new(move |message: &Message| {
				let topic: Vec<&str> = message.topic.split('/').collect();
				if filters.iter().any(|filter| filter.matches_segments(&topic)) {
					producer.add(message.clone());
				}
			})
		}
		| MessageRouting::Everything => {
			Box::new(move |message: &Message| producer.add(message.clone()))
		}
	}
}

/// Broker subscription plus installed handler of a live session.
///
/// The handler is removed when this value is dropped, so removal happens
/// exactly once whatever happens to the unsubscribe request.
struct Session<C: Connection> {
	connection: Arc<C>,
	filters: Vec<TopicFilter>,
	handler_id: HandlerId,
}

impl<C: Connection> Session<C> {
	async fn release(self) -> Result<(), ConnectionError> {
		let unsubscribed = self.connection.unsubscribe(&self.filters).await;
		drop(self);
		unsubscribed
	}
}

impl<C: Connection> Drop for Session<C> {
	fn drop(&mut self) {
		if !self.connection.remove_handler(self.handler_id) {
			warn!(handler_id = %self.handler_id, "Message handler was already removed");
		}
	}
}

/// Stream of messages received on a set of topic filters.
///
/// Created by `MqttClient::subscribe()`. Messages arrive in the order the
/// connection delivered them. The subscription ends when [`close`] is
/// called, when the client is closed, or when it is dropped; in every case
/// the broker subscription is released and the message handler removed
/// exactly once.
///
/// [`close`]: Subscription::close
pub struct Subscription<C: Connection> {
	filters: Vec<TopicFilter>,
	drain: Drain<Message>,
	session: Option<Session<C>>,
	release: Option<JoinHandle<Result<(), ConnectionError>>>,
	state: SessionState,
}

impl<C: Connection> Subscription<C> {
	/// Subscribes to `filters` and installs the message handler.
	///
	/// Nothing needs to be released when this fails.
	pub(crate) async fn open(
		connection: Arc<C>,
		filters: Vec<TopicFilter>,
		options: SubscribeOptions,
		stop: StopSignal,
	) -> Result<Self, MqttClientError> {
		let queue = ConcurrentQueue::new();
		let handler =
			message_handler(queue.producer(), &filters, options.routing);

		debug!(
			filters = ?filter_names(&filters),
			qos = ?options.qos,
			routing = ?options.routing,
			state = %SessionState::Subscribing,
			"Opening subscription"
		);
		let handler_id = connection
			.subscribe(&filters, options.qos, handler)
			.await
			.map_err(|source| {
				debug!(
					filters = ?filter_names(&filters),
					error = %source,
					state = %SessionState::Closed,
					"Subscribe failed"
				);
				MqttClientError::Subscribe {
					filters: filter_names(&filters),
					source,
				}
			})?;
		debug!(
			filters = ?filter_names(&filters),
			handler_id = %handler_id,
			state = %SessionState::Active,
			"Subscription active"
		);

		Ok(Self {
			drain: queue.drain(stop),
			session: Some(Session {
				connection,
				filters: filters.clone(),
				handler_id,
			}),
			filters,
			release: None,
			state: SessionState::Active,
		})
	}

	/// Filters this subscription was opened with.
	pub fn filters(&self) -> &[TopicFilter] {
		&self.filters
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Waits for the next message.
	///
	/// Returns `None` once the subscription is closed. When the client's
	/// stop signal ends the subscription, teardown runs here; a failed
	/// unsubscribe is then reported as one final `Err` item.
	///
	/// Cancelling this future during teardown does not abort the
	/// unsubscribe: it keeps running in the background, and the next call
	/// waits for it and reports its outcome.
	pub async fn next(&mut self) -> Option<Result<Message, MqttClientError>> {
		if self.state == SessionState::Closed {
			return None;
		}
		match self.drain.next().await {
			| Some(message) => Some(Ok(message)),
			| None => self.teardown().await.err().map(Err),
		}
	}

	/// Stops the subscription: unsubscribes and removes the handler.
	///
	/// The handler is removed even when unsubscribing fails; the failure is
	/// returned afterwards. Closing an already closed subscription is a
	/// no-op. Cancelling this future leaves the release running in the
	/// background.
	pub async fn close(mut self) -> Result<(), MqttClientError> {
		self.teardown().await
	}

	/// Adapts the subscription into a [`Stream`].
	///
	/// Dropping the stream releases the subscription in the background.
	pub fn into_stream(
		self,
	) -> impl Stream<Item = Result<Message, MqttClientError>> {
		futures::stream::unfold(self, |mut subscription| async move {
			subscription
				.next()
				.await
				.map(|item| (item, subscription))
		})
	}

	async fn teardown(&mut self) -> Result<(), MqttClientError> {
		if let Some(session) = self.session.take() {
			self.state = SessionState::Draining;
			debug!(
				filters = ?filter_names(&self.filters),
				state = %self.state,
				"Releasing subscription"
			);
			self.drain.close();
			// Runs on its own task so a cancelled caller cannot abandon the
			// unsubscribe halfway; the next call picks the handle up again.
			self.release = Some(tokio::spawn(session.release()));
		}
		let Some(release) = self.release.as_mut() else {
			return Ok(());
		};
		let joined = release.await;
		self.release = None;
		self.state = SessionState::Closed;

		match released(joined) {
			| Ok(()) => Ok(()),
			| Err(source) => {
				warn!(
					filters = ?filter_names(&self.filters),
					error = %source,
					"Failed to unsubscribe"
				);
				Err(MqttClientError::Unsubscribe {
					filters: filter_names(&self.filters),
					source,
				})
			}
		}
	}
}

/// Outcome of a release task. A closed connection has nothing left to
/// unsubscribe from.
fn released(
	joined: Result<Result<(), ConnectionError>, JoinError>,
) -> Result<(), ConnectionError> {
	match joined {
		| Ok(Err(ConnectionError::Closed)) => {
			debug!("Connection already closed, no broker subscription left");
			Ok(())
		}
		| Ok(result) => result,
		| Err(join_error) => {
			error!(error = %join_error, "Subscription release task failed");
			Err(ConnectionError::Closed)
		}
	}
}

impl<C: Connection> fmt::Debug for Subscription<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("filters", &filter_names(&self.filters))
			.field("state", &self.state)
			.finish()
	}
}

impl<C: Connection> Drop for Subscription<C> {
	fn drop(&mut self) {
		let filters = filter_names(&self.filters);
		let release = match (self.session.take(), self.release.take()) {
			| (Some(session), _) => {
				self.drain.close();
				match tokio::runtime::Handle::try_current() {
					| Ok(runtime) => runtime.spawn(session.release()),
					| Err(_) => {
						warn!(
							filters = ?filters,
							"Subscription dropped outside a tokio runtime, \
							 broker subscription left in place"
						);
						// Dropping the session still removes the handler.
						return;
					}
				}
			}
			// Teardown was interrupted; its task is still running.
			| (None, Some(release)) => release,
			| (None, None) => return,
		};
		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			return;
		};
		runtime.spawn(async move {
			match released(release.await) {
				| Ok(()) => {
					debug!(filters = ?filters, "Subscription released in Drop");
				}
				| Err(err) => {
					error!(
						filters = ?filters,
						error = %err,
						"Failed to unsubscribe in Drop"
					);
				}
			}
		});
	}
}
