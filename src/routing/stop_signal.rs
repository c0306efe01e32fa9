//! Client-wide stop signal

use tokio_util::sync::CancellationToken;

/// One-shot, client-wide cancellation signal.
///
/// Cloning shares the same signal. Once triggered it stays triggered, and
/// every drain waiting on it wakes up and terminates.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
	token: CancellationToken,
}

impl StopSignal {
	/// Creates an active (not yet triggered) signal.
	pub fn new() -> Self {
		Self::default()
	}

	/// Triggers the signal. Subsequent calls have no effect.
	pub fn trigger(&self) {
		self.token.cancel();
	}

	/// Whether the signal has been triggered.
	pub fn is_triggered(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Completes once the signal is triggered.
	pub async fn triggered(&self) {
		self.token.cancelled().await
	}
}
