use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic generation clock for runs and superseding timers.
#[derive(Debug, Default, Clone)]
pub struct RunClock {
	next: Arc<AtomicU64>,
}

impl RunClock {
	/// Creates a new clock; the first [`Self::next`] returns 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next generation ID.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

/// Generation-scoped cancellation token for one run.
#[derive(Debug, Clone)]
pub struct RunToken {
	generation: u64,
	cancel: CancellationToken,
}

impl RunToken {
	/// Creates a root token for `generation`.
	pub fn new(generation: u64) -> Self {
		Self {
			generation,
			cancel: CancellationToken::new(),
		}
	}

	/// Returns the generation ID.
	pub const fn generation(&self) -> u64 {
		self.generation
	}

	/// Returns true once cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Requests cancellation; every clone of the underlying token observes it.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Borrows the underlying cancellation token.
	pub fn as_cancellation(&self) -> &CancellationToken {
		&self.cancel
	}
}
