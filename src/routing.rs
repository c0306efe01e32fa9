//! Message routing and subscription lifecycle
//!
//! Inbound messages are pushed by connection handlers into a
//! [`ConcurrentQueue`] and consumed through its [`Drain`], which a
//! client-wide [`StopSignal`] can end at any time. [`Subscription`] ties a
//! drain to a broker subscription and releases both exactly once.

pub mod queue;
pub mod stop_signal;
pub mod subscription;

#[cfg(test)]
mod queue_tests;

pub use queue::{ConcurrentQueue, Drain, QueueProducer};
pub use stop_signal::StopSignal;
pub use subscription::{
	MessageRouting, SessionState, SubscribeOptions, Subscription,
};
