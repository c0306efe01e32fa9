//! Per-subscription message queue

use futures::Stream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use super::stop_signal::StopSignal;

/// Unbounded multi-producer, single-consumer FIFO queue.
///
/// Producers never block. The consumer side is taken once with
/// [`ConcurrentQueue::drain`].
#[derive(Debug)]
pub struct ConcurrentQueue<T> {
	tx: UnboundedSender<T>,
	rx: UnboundedReceiver<T>,
}

impl<T> Default for ConcurrentQueue<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> ConcurrentQueue<T> {
	/// Creates an empty queue.
	pub fn new() -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		Self { tx, rx }
	}

	/// Returns a cloneable handle that appends to this queue.
	pub fn producer(&self) -> QueueProducer<T> {
		QueueProducer {
			tx: self.tx.clone(),
		}
	}

	/// Appends an item to the tail of the queue.
	pub fn add(&self, item: T) {
		// The receiver lives in `self`, so this cannot fail.
		let _ = self.tx.send(item);
	}

	/// Number of queued items.
	pub fn len(&self) -> usize {
		self.rx.len()
	}

	/// Whether no item is queued.
	pub fn is_empty(&self) -> bool {
		self.rx.is_empty()
	}

	/// Turns the queue into its consuming side.
	///
	/// The drain yields queued items in insertion order and ends when `stop`
	/// is triggered, when it is closed, or once every producer is gone and
	/// the queue is empty.
	pub fn drain(self, stop: StopSignal) -> Drain<T> {
		Drain {
			rx: self.rx,
			stop,
			closed: false,
		}
	}
}

/// Producer handle of a [`ConcurrentQueue`].
#[derive(Debug)]
pub struct QueueProducer<T> {
	tx: UnboundedSender<T>,
}

impl<T> Clone for QueueProducer<T> {
	fn clone(&self) -> Self {
		Self {
			tx: self.tx.clone(),
		}
	}
}

impl<T> QueueProducer<T> {
	/// Appends an item; never blocks.
	///
	/// Items added after the drain was closed or dropped are discarded.
	pub fn add(&self, item: T) {
		if self.tx.send(item).is_err() {
			trace!("Queue consumer is gone, item discarded");
		}
	}

	/// Whether the consuming side is gone.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

/// Cancellable, blocking consumer of a [`ConcurrentQueue`].
#[derive(Debug)]
pub struct Drain<T> {
	rx: UnboundedReceiver<T>,
	stop: StopSignal,
	closed: bool,
}

impl<T> Drain<T> {
	/// Waits for the next item.
	///
	/// Returns `None` once the stop signal is triggered, even if items are
	/// still queued, and on every call after that.
	pub async fn next(&mut self) -> Option<T> {
		if self.closed {
			return None;
		}
		let next = tokio::select! {
			biased;
			_ = self.stop.triggered() => None,
			item = self.rx.recv() => item,
		};
		if next.is_none() {
			self.close();
		}
		next
	}

	/// Ends the drain early. Pending items are discarded and producers
	/// observe the queue as closed.
	pub fn close(&mut self) {
		if !self.closed {
			self.closed = true;
			self.rx.close();
		}
	}

	/// Whether the drain has terminated.
	pub fn is_closed(&self) -> bool {
		self.closed
	}

	/// Adapts the drain into a [`Stream`].
	pub fn into_stream(self) -> impl Stream<Item = T> {
		futures::stream::unfold(self, |mut drain| async move {
			drain.next().await.map(|item| (item, drain))
		})
	}
}
