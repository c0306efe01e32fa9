//! `rumqttc`-backed [`Connection`]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use rumqttc::Packet::{self, Disconnect, Publish};
use rumqttc::{
	AsyncClient, ConnAck, ConnectReturnCode, EventLoop, MqttOptions, QoS,
	SubscribeFilter,
};
use rumqttc::{Event::Incoming, Event::Outgoing};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::ack_tracker::{AckTracker, PendingPublish, PendingSubscribe, Ticket};
use super::handlers::{HandlerId, HandlerRegistry, MessageHandler};
use super::publish::{PublishAck, PublishOptions};
use super::{Connection, ConnectionError};
use crate::client::ClientSettings;
use crate::message::Message;
use crate::topic::TopicFilter;

/// Link state published by the event loop task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
	Connected,
	Reconnecting,
	Closed,
}

/// State shared between the connection handle and its event loop task.
struct Shared {
	handlers: HandlerRegistry,
	tracker: Mutex<AckTracker>,
	/// Keeps pending entries in the same order as rumqttc's request channel.
	request_order: tokio::sync::Mutex<()>,
	state: Mutex<LinkState>,
}

impl Shared {
	fn tracker(&self) -> MutexGuard<'_, AckTracker> {
		self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn set_state(&self, state: LinkState) {
		*self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
	}

	fn link_state(&self) -> LinkState {
		*self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn ensure_open(&self) -> Result<(), ConnectionError> {
		match self.link_state() {
			| LinkState::Closed => Err(ConnectionError::Closed),
			| _ => Ok(()),
		}
	}

	/// Guard that withdraws a queued request unless marked as sent.
	fn withdraw_on_drop<'a>(
		&'a self,
		ticket: Ticket,
		withdraw: impl FnOnce(&mut AckTracker, Ticket) -> bool + 'a,
	) -> QueuedRequest<impl FnOnce() + 'a> {
		QueuedRequest::new(move || {
			if withdraw(&mut *self.tracker(), ticket) {
				debug!(ticket, "Withdrew request that was never sent");
			}
		})
	}

	fn close(&self) {
		self.set_state(LinkState::Closed);
		self.tracker().close();
	}
}

/// Removes a queued request from the tracker unless it was handed over to
/// the protocol client.
struct QueuedRequest<F: FnOnce()> {
	withdraw: Option<F>,
}

impl<F: FnOnce()> QueuedRequest<F> {
	fn new(withdraw: F) -> Self {
		Self {
			withdraw: Some(withdraw),
		}
	}

	fn sent(mut self) {
		self.withdraw = None;
	}
}

impl<F: FnOnce()> Drop for QueuedRequest<F> {
	fn drop(&mut self) {
		if let Some(withdraw) = self.withdraw.take() {
			withdraw();
		}
	}
}

/// MQTT connection driven by a `rumqttc` event loop on a background task.
///
/// Created by [`RumqttConnection::connect`], which returns once the broker
/// accepted the connection. Call [`Connection::end`] before dropping it.
pub struct RumqttConnection {
	client: AsyncClient,
	shared: Arc<Shared>,
	event_loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RumqttConnection {
	/// Connects to the broker and starts the event loop task.
	///
	/// Waits without a timeout: network failures are retried with
	/// exponential backoff until `settings.max_consecutive_errors` is
	/// reached. A broker refusal fails immediately.
	pub async fn connect(
		options: MqttOptions,
		settings: ClientSettings,
	) -> Result<Self, ConnectionError> {
		let (client, event_loop) =
			AsyncClient::new(options, settings.event_loop_capacity);
		let connected_event_loop =
			Self::establish_connection(event_loop, &settings).await?;

		let shared = Arc::new(Shared {
			handlers: HandlerRegistry::new(),
			tracker: Mutex::new(AckTracker::default()),
			request_order: tokio::sync::Mutex::new(()),
			state: Mutex::new(LinkState::Connected),
		});

		// The event loop terminates on a Disconnect packet or once the
		// error budget is exhausted.
		let event_loop_handle = tokio::spawn(Self::run(
			connected_event_loop,
			client.clone(),
			Arc::clone(&shared),
			settings,
		));

		Ok(Self {
			client,
			shared,
			event_loop_handle: Mutex::new(Some(event_loop_handle)),
		})
	}

	async fn establish_connection(
		mut event_loop: EventLoop,
		settings: &ClientSettings,
	) -> Result<EventLoop, ConnectionError> {
		let mut error_count = 0;
		loop {
			match event_loop.poll().await {
				| Ok(Incoming(Packet::ConnAck(ConnAck { code, .. }))) => {
					if code == ConnectReturnCode::Success {
						debug!("MQTT connection established successfully");
						return Ok(event_loop);
					} else {
						debug!(code = ?code, "MQTT connection rejected by broker");
						return Err(ConnectionError::BrokerRejected { code });
					}
				}
				| Ok(notification) => {
					debug!(notification = ?notification, "Bootstrap phase notification");
				}
				| Err(rumqttc::ConnectionError::ConnectionRefused(code)) => {
					debug!(code = ?code, "MQTT connection refused by broker");
					return Err(ConnectionError::BrokerRejected { code });
				}
				| Err(connection_err) => {
					error_count += 1;
					debug!(
						error_count,
						error = %connection_err,
						"MQTT connection error during bootstrap phase"
					);
					if error_count >= settings.max_consecutive_errors {
						return Err(ConnectionError::Network(connection_err));
					}
					time::sleep(settings.retry_delay(error_count)).await;
				}
			}
		}
	}

	/// Processes MQTT events until a Disconnect packet is seen or too many
	/// consecutive errors occur.
	async fn run(
		mut event_loop: EventLoop,
		client: AsyncClient,
		shared: Arc<Shared>,
		settings: ClientSettings,
	) {
		let mut error_count = 0;

		loop {
			match event_loop.poll().await {
				| Ok(Incoming(Packet::ConnAck(ConnAck {
					session_present,
					code: ConnectReturnCode::Success,
				}))) => {
					shared.set_state(LinkState::Connected);
					if session_present {
						info!(
							"MQTT reconnected with session preserved, \
							 subscriptions maintained by broker"
						);
					} else {
						info!(
							"MQTT reconnected without session, resubscribing \
							 to all topics"
						);
						tokio::spawn(Self::resubscribe_all(
							client.clone(),
							Arc::clone(&shared),
						));
					}
				}
				| Ok(Incoming(Publish(p))) => {
					error_count = 0;
					debug!(topic = %p.topic, payload_size = p.payload.len(), "Received MQTT message");
					let message = Message::from(p);
					let handled = shared.handlers.dispatch(&message);
					if handled == 0 {
						debug!(topic = %message.topic, "No message handler registered");
					}
				}
				| Ok(Incoming(Packet::SubAck(ack))) => {
					shared.tracker().subscribe_acked(&ack, &shared.handlers);
				}
				| Ok(Incoming(Packet::UnsubAck(ack))) => {
					shared.tracker().unsubscribe_acked(ack.pkid);
				}
				| Ok(Incoming(Packet::PubAck(ack))) => {
					shared.tracker().publish_acked(ack);
				}
				| Ok(Incoming(Packet::PubComp(comp))) => {
					shared.tracker().publish_completed(comp);
				}
				| Ok(Outgoing(rumqttc::Outgoing::Subscribe(pkid))) => {
					shared.tracker().subscribes.sent(pkid);
				}
				| Ok(Outgoing(rumqttc::Outgoing::Unsubscribe(pkid))) => {
					shared.tracker().unsubscribes.sent(pkid);
				}
				| Ok(Outgoing(rumqttc::Outgoing::Publish(pkid))) => {
					shared.tracker().publish_sent(pkid);
				}
				| Ok(Incoming(Disconnect)) => {
					info!("Received MQTT Disconnect packet from server");
					break;
				}
				| Ok(Outgoing(rumqttc::Outgoing::Disconnect)) => {
					info!("Sent MQTT Disconnect packet to server");
					break;
				}
				| Ok(notification) => {
					error_count = 0;
					debug!(notification = ?notification, "Received OTHER MQTT notification");
				}
				| Err(err) => {
					error_count += 1;
					error!(error_count = error_count, error = %err, "MQTT event loop error");
					shared.set_state(LinkState::Reconnecting);
					shared.tracker().interrupt();

					if error_count >= settings.max_consecutive_errors {
						error!(
							error_count = error_count,
							max_errors = settings.max_consecutive_errors,
							"Too many consecutive errors, terminating event \
							 loop"
						);
						break;
					}

					let delay = settings.retry_delay(error_count);
					warn!(delay = ?delay, error_count = error_count, "Retrying MQTT connection");
					time::sleep(delay).await;
				}
			}
		}
		// Later requests fail to send instead of waiting for an ack.
		drop(event_loop);
		shared.close();
		info!("MQTT event loop terminated");
	}

	/// Restores broker subscriptions of every registered handler.
	async fn resubscribe_all(client: AsyncClient, shared: Arc<Shared>) {
		for (filters, qos) in shared.handlers.subscriptions() {
			let res =
				Self::request_subscribe(&client, &shared, &filters, qos, None)
					.await;
			if let Err(err) = res {
				let filters: Vec<&str> =
					filters.iter().map(TopicFilter::as_str).collect();
				error!(filters = ?filters, error = %err, "Failed to resubscribe");
			}
		}
	}

	async fn request_subscribe(
		client: &AsyncClient,
		shared: &Shared,
		filters: &[TopicFilter],
		qos: QoS,
		handler: Option<MessageHandler>,
	) -> Result<Option<HandlerId>, ConnectionError> {
		let (reply, response) = oneshot::channel();
		{
			let _order = shared.request_order.lock().await;
			shared.ensure_open()?;
			let ticket = shared.tracker().subscribes.enqueue(PendingSubscribe {
				filters: filters.to_vec(),
				qos,
				handler,
				reply,
			});
			let queued = shared.withdraw_on_drop(ticket, |tracker, ticket| {
				tracker.subscribes.cancel(ticket).is_some()
			});
			client
				.subscribe_many(filters.iter().map(|filter| {
					SubscribeFilter::new(filter.as_str().to_string(), qos)
				}))
				.await?;
			queued.sent();
		}
		response.await.map_err(|_| ConnectionError::Closed)?
	}

	async fn request_unsubscribe(
		&self,
		filter: &TopicFilter,
	) -> Result<(), ConnectionError> {
		let (reply, response) = oneshot::channel();
		{
			let _order = self.shared.request_order.lock().await;
			self.shared.ensure_open()?;
			let ticket = self.shared.tracker().unsubscribes.enqueue(reply);
			let queued = self.shared.withdraw_on_drop(ticket, |tracker, ticket| {
				tracker.unsubscribes.cancel(ticket).is_some()
			});
			self.client.unsubscribe(filter.as_str()).await?;
			queued.sent();
		}
		response.await.map_err(|_| ConnectionError::Closed)?
	}
}

impl Connection for RumqttConnection {
	async fn subscribe(
		&self,
		filters: &[TopicFilter],
		qos: QoS,
		handler: MessageHandler,
	) -> Result<HandlerId, ConnectionError> {
		let installed = Self::request_subscribe(
			&self.client,
			&self.shared,
			filters,
			qos,
			Some(handler),
		)
		.await?;
		// A handler was supplied, so success always carries its id.
		installed.ok_or(ConnectionError::Closed)
	}

	async fn unsubscribe(
		&self,
		filters: &[TopicFilter],
	) -> Result<(), ConnectionError> {
		// rumqttc sends one UNSUBSCRIBE per filter.
		let mut result = Ok(());
		for filter in filters {
			if let Err(err) = self.request_unsubscribe(filter).await {
				warn!(filter = %filter, error = %err, "Unsubscribe failed");
				if result.is_ok() {
					result = Err(err);
				}
			}
		}
		result
	}

	fn remove_handler(&self, id: HandlerId) -> bool {
		self.shared.handlers.remove(id)
	}

	async fn publish(
		&self,
		topic: &str,
		payload: Bytes,
		options: PublishOptions,
	) -> Result<PublishAck, ConnectionError> {
		let (reply, response) = oneshot::channel();
		{
			let _order = self.shared.request_order.lock().await;
			self.shared.ensure_open()?;
			let ticket =
				self.shared.tracker().publishes.enqueue(PendingPublish {
					qos: options.qos,
					reply,
				});
			let queued = self.shared.withdraw_on_drop(ticket, |tracker, ticket| {
				tracker.publishes.cancel(ticket).is_some()
			});
			self.client
				.publish_bytes(topic, options.qos, options.retain, payload)
				.await?;
			queued.sent();
		}
		response.await.map_err(|_| ConnectionError::Closed)?
	}

	async fn end(&self, force: bool) {
		let handle = self
			.event_loop_handle
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take();
		let Some(handle) = handle else {
			debug!("MQTT connection already ended");
			return;
		};

		if force {
			handle.abort();
			let _ = handle.await;
			self.shared.close();
			info!("MQTT connection closed forcibly");
			return;
		}

		// The event loop stops after writing the Disconnect packet.
		if let Err(e) = self.client.disconnect().await {
			warn!(error = %e, "Failed to disconnect MQTT client");
			handle.abort();
		}
		if let Err(e) = handle.await {
			if !e.is_cancelled() {
				warn!(error = %e, "Event loop task failed");
			}
		}
		self.shared.close();
	}

	fn is_connected(&self) -> bool {
		self.shared.link_state() == LinkState::Connected
	}

	fn is_reconnecting(&self) -> bool {
		self.shared.link_state() == LinkState::Reconnecting
	}
}

impl Drop for RumqttConnection {
	fn drop(&mut self) {
		let handle = self
			.event_loop_handle
			.get_mut()
			.unwrap_or_else(PoisonError::into_inner)
			.take();
		if let Some(handle) = handle {
			error!(
				"RumqttConnection dropped without calling end(). Please call \
				 end() and await its completion before dropping."
			);
			handle.abort();
		}
	}
}

impl std::fmt::Debug for RumqttConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RumqttConnection")
			.field("state", &self.shared.link_state())
			.field("handlers", &self.shared.handlers)
			.finish()
	}
}
