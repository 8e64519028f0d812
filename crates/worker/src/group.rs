use std::future::Future;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::TaskClass;

/// A set of sibling tasks sharing one cancellation token.
///
/// Spawning is routed through the worker runtime entry so tasks attach to the
/// active runtime context. Dropping the group cancels the token and aborts any
/// task still running, so a discarded owner never leaks its tasks.
#[derive(Debug)]
pub struct TaskGroup {
	class: TaskClass,
	cancel: CancellationToken,
	inner: JoinSet<()>,
}

impl TaskGroup {
	/// Creates an empty group whose tasks observe `cancel`.
	pub fn new(class: TaskClass, cancel: CancellationToken) -> Self {
		Self {
			class,
			cancel,
			inner: JoinSet::new(),
		}
	}

	/// Returns the number of tasks not yet joined.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	/// Returns `true` if no task is left to join.
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Returns the token shared by the group's tasks.
	pub fn token(&self) -> &CancellationToken {
		&self.cancel
	}

	/// Spawns a future into the group on the current worker runtime handle.
	#[allow(clippy::disallowed_methods)]
	pub fn spawn<F>(&mut self, fut: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		tracing::trace!(worker_class = self.class.as_str(), pending = self.inner.len(), "worker.group.spawn");
		let handle = crate::current_handle();
		self.inner.spawn_on(fut, &handle);
	}

	/// Requests cancellation; tasks are expected to observe the token and exit.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Waits for every task to finish, returning the failed joins.
	pub async fn join_all(&mut self) -> Vec<JoinError> {
		let mut failures = Vec::new();
		while let Some(res) = self.inner.join_next().await {
			if let Err(err) = res {
				tracing::debug!(worker_class = self.class.as_str(), error = %err, "worker.group.join_failed");
				failures.push(err);
			}
		}
		failures
	}
}

impl Drop for TaskGroup {
	fn drop(&mut self) {
		self.cancel.cancel();
		if !self.inner.is_empty() {
			tracing::trace!(worker_class = self.class.as_str(), pending = self.inner.len(), "worker.group.abort");
			self.inner.abort_all();
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	use super::*;

	#[tokio::test]
	async fn join_all_waits_for_every_task() {
		let done = Arc::new(AtomicUsize::new(0));
		let mut group = TaskGroup::new(TaskClass::Dispatch, CancellationToken::new());
		for _ in 0..4 {
			let done = Arc::clone(&done);
			group.spawn(async move {
				tokio::task::yield_now().await;
				done.fetch_add(1, Ordering::SeqCst);
			});
		}
		assert_eq!(group.len(), 4);

		let failures = group.join_all().await;
		assert!(failures.is_empty());
		assert!(group.is_empty());
		assert_eq!(done.load(Ordering::SeqCst), 4);
	}

	#[tokio::test]
	async fn cancel_reaches_tasks_through_shared_token() {
		let mut group = TaskGroup::new(TaskClass::Dispatch, CancellationToken::new());
		let token = group.token().clone();
		group.spawn(async move {
			tokio::select! {
				_ = token.cancelled() => {}
				_ = tokio::time::sleep(Duration::from_secs(60)) => panic!("token should have fired"),
			}
		});

		group.cancel();
		let failures = tokio::time::timeout(Duration::from_secs(1), group.join_all()).await.expect("tasks should exit promptly");
		assert!(failures.is_empty());
	}

	#[tokio::test]
	async fn drop_aborts_tasks_that_ignore_the_token() {
		let finished = Arc::new(AtomicUsize::new(0));
		let cancel = CancellationToken::new();
		{
			let mut group = TaskGroup::new(TaskClass::Dispatch, cancel.clone());
			let finished = Arc::clone(&finished);
			group.spawn(async move {
				tokio::time::sleep(Duration::from_secs(60)).await;
				finished.fetch_add(1, Ordering::SeqCst);
			});
		}

		assert!(cancel.is_cancelled());
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(finished.load(Ordering::SeqCst), 0);
	}
}
