use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::TaskClass;

/// A future scheduled to run once after a delay unless cancelled first.
///
/// Cancellation before the deadline guarantees the future is never polled.
/// Once the deadline passes the future runs to completion; callers that need
/// to discard a late fire must check their own state inside the future.
/// Dropping the handle cancels.
#[derive(Debug)]
pub struct DelayedTask {
	cancel: CancellationToken,
}

impl DelayedTask {
	/// Schedules `fut` to run after `delay`.
	pub fn schedule<F>(class: TaskClass, delay: Duration, fut: F) -> Self
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let cancel = CancellationToken::new();
		let task_cancel = cancel.clone();
		drop(crate::spawn(class, async move {
			tokio::select! {
				biased;
				_ = task_cancel.cancelled() => {
					tracing::trace!(worker_class = class.as_str(), "worker.delayed.cancelled");
				}
				_ = tokio::time::sleep(delay) => fut.await,
			}
		}));
		Self { cancel }
	}

	/// Cancels the task if it has not fired yet.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}
}

impl Drop for DelayedTask {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}
