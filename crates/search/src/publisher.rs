//! Coalesces result-change notifications to at most one per interval.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use quarry_worker::{DelayedTask, RunClock, TaskClass};
use tokio::time::Instant;

use crate::aggregator::ResultAggregator;
use crate::observer::SearchObserver;

/// Throttles snapshots of one run's aggregator towards the observer.
///
/// The first change publishes immediately. Changes inside the interval after
/// a publish collapse into a single deferred publish due when the interval
/// ends. [`Self::flush_final`] always publishes and retires the publisher.
#[derive(Clone)]
pub struct ThrottledPublisher {
	inner: Arc<PublisherInner>,
}

struct PublisherInner {
	aggregator: Arc<ResultAggregator>,
	observer: Arc<dyn SearchObserver>,
	interval: Duration,
	clock: RunClock,
	state: Mutex<PublishState>,
}

#[derive(Default)]
struct PublishState {
	last_publish: Option<Instant>,
	pending: Option<Pending>,
	finished: bool,
	published: usize,
}

struct Pending {
	generation: u64,
	task: DelayedTask,
}

impl ThrottledPublisher {
	pub fn new(aggregator: Arc<ResultAggregator>, observer: Arc<dyn SearchObserver>, interval: Duration) -> Self {
		Self {
			inner: Arc::new(PublisherInner {
				aggregator,
				observer,
				interval,
				clock: RunClock::new(),
				state: Mutex::new(PublishState::default()),
			}),
		}
	}

	pub fn interval(&self) -> Duration {
		self.inner.interval
	}

	/// Signals that the aggregator changed. No-op once finished.
	pub fn notify_changed(&self) {
		let inner = &self.inner;
		let mut state = inner.state.lock();
		if state.finished {
			return;
		}

		let now = Instant::now();
		match state.last_publish {
			Some(last) if now.duration_since(last) < inner.interval => {
				let due = last + inner.interval;
				let generation = inner.clock.next();
				let weak = Arc::downgrade(inner);
				let task = DelayedTask::schedule(TaskClass::Publish, due.saturating_duration_since(now), fire(weak, generation));
				if let Some(stale) = state.pending.replace(Pending { generation, task }) {
					stale.task.cancel();
				}
				tracing::trace!(generation, "search.publish.deferred");
			}
			_ => {
				if let Some(pending) = state.pending.take() {
					pending.task.cancel();
				}
				inner.publish_locked(&mut state, now);
			}
		}
	}

	/// Publishes the current snapshot unconditionally and stops further
	/// publishing. Later calls do nothing.
	pub fn flush_final(&self) {
		let inner = &self.inner;
		let mut state = inner.state.lock();
		if state.finished {
			return;
		}
		if let Some(pending) = state.pending.take() {
			pending.task.cancel();
		}
		inner.publish_locked(&mut state, Instant::now());
		state.finished = true;
	}

	/// Stops publishing without a final snapshot, discarding any pending one.
	pub fn retire(&self) {
		let mut state = self.inner.state.lock();
		if let Some(pending) = state.pending.take() {
			pending.task.cancel();
		}
		state.finished = true;
	}

	pub fn is_finished(&self) -> bool {
		self.inner.state.lock().finished
	}

	/// Number of snapshots delivered so far.
	pub fn published(&self) -> usize {
		self.inner.state.lock().published
	}
}

async fn fire(publisher: Weak<PublisherInner>, generation: u64) {
	if let Some(inner) = publisher.upgrade() {
		inner.fire_deferred(generation);
	}
}

impl PublisherInner {
	fn fire_deferred(&self, generation: u64) {
		let mut state = self.state.lock();
		if state.finished || state.pending.as_ref().is_none_or(|pending| pending.generation != generation) {
			tracing::trace!(generation, "search.publish.stale");
			return;
		}
		state.pending = None;
		self.publish_locked(&mut state, Instant::now());
	}

	fn publish_locked(&self, state: &mut PublishState, now: Instant) {
		let snapshot = self.aggregator.snapshot();
		state.last_publish = Some(now);
		state.published += 1;
		tracing::trace!(results = snapshot.len(), published = state.published, "search.publish");
		self.observer.on_results_changed(snapshot);
	}
}
