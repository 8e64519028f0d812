//! Fixed-size set of dispatch slots draining a shared cursor.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use quarry_worker::{CancellationToken, TaskClass, TaskGroup};

use crate::cursor::DispatchCursor;
use crate::fetch::Capability;
use crate::model::{Candidate, Query, Source};
use crate::query::{QueryError, SourceQuery};

/// Hard upper bound on concurrent dispatch slots.
pub const MAX_WORKERS: usize = 8;

/// Receives the output of dispatch slots.
pub trait SlotObserver: Send + Sync + 'static {
	/// A source answered with a candidate. Called from slot tasks concurrently.
	fn on_candidate(&self, candidate: Candidate);

	/// Slot `slot` has exited. Called exactly once per launched slot, including
	/// when the slot is cancelled, aborted or panics.
	fn on_slot_drained(&self, slot: usize);
}

/// Counts slots that observed exhaustion against slots launched.
#[derive(Debug)]
pub struct DrainLatch {
	launched: usize,
	drained: AtomicUsize,
}

impl DrainLatch {
	pub fn new(launched: usize) -> Self {
		Self {
			launched,
			drained: AtomicUsize::new(0),
		}
	}

	/// Records one drained slot. Returns true for exactly one caller: the one
	/// whose report completes the set.
	pub fn mark_drained(&self) -> bool {
		let drained = self.drained.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
		drained == self.launched
	}

	pub const fn launched(&self) -> usize {
		self.launched
	}

	pub fn drained(&self) -> usize {
		self.drained.load(Ordering::Acquire)
	}

	pub fn is_complete(&self) -> bool {
		self.drained() >= self.launched
	}
}

/// Spawns slots that pull sources off a [`DispatchCursor`] and query them.
#[derive(Clone)]
pub struct WorkerPool {
	source_query: SourceQuery,
	capability: Capability,
	workers: usize,
}

impl WorkerPool {
	/// Creates a pool; `configured_workers` is clamped to `1..=MAX_WORKERS`.
	pub fn new(source_query: SourceQuery, capability: Capability, configured_workers: usize) -> Self {
		Self {
			source_query,
			capability,
			workers: configured_workers.clamp(1, MAX_WORKERS),
		}
	}

	pub const fn workers(&self) -> usize {
		self.workers
	}

	/// Number of slots a run over `total` sources launches.
	pub fn slots_for(&self, total: usize) -> usize {
		self.workers.min(total)
	}

	/// Launches `slots_for(cursor.total())` slots over `sources`, which must
	/// hold at least `cursor.total()` entries. An empty cursor launches nothing.
	pub fn run(
		&self,
		cursor: Arc<DispatchCursor>,
		sources: Arc<[Source]>,
		query: Arc<Query>,
		observer: Arc<dyn SlotObserver>,
		cancel: CancellationToken,
	) -> PoolHandle {
		debug_assert!(sources.len() >= cursor.total());
		let slots = self.slots_for(cursor.total());
		let mut group = TaskGroup::new(TaskClass::Dispatch, cancel);

		for slot in 0..slots {
			let ctx = SlotContext {
				slot,
				cursor: Arc::clone(&cursor),
				sources: Arc::clone(&sources),
				query: Arc::clone(&query),
				source_query: self.source_query.clone(),
				capability: Arc::clone(&self.capability),
				observer: Arc::clone(&observer),
				cancel: group.token().clone(),
			};
			group.spawn(run_slot(ctx));
		}

		tracing::debug!(sources = cursor.total(), slots, "search.pool.launched");
		PoolHandle { group, cursor, slots }
	}
}

/// Owns the slot tasks of one run. Dropping it cancels and aborts them.
#[derive(Debug)]
pub struct PoolHandle {
	group: TaskGroup,
	cursor: Arc<DispatchCursor>,
	slots: usize,
}

impl PoolHandle {
	pub const fn slots(&self) -> usize {
		self.slots
	}

	pub fn cursor(&self) -> &DispatchCursor {
		&self.cursor
	}

	/// Requests cancellation of every slot.
	pub fn cancel(&self) {
		self.group.cancel();
	}

	/// Waits for every slot task to exit.
	pub async fn join(&mut self) {
		for err in self.group.join_all().await {
			tracing::warn!(error = %err, "search.slot.join_failed");
		}
	}
}

struct SlotContext {
	slot: usize,
	cursor: Arc<DispatchCursor>,
	sources: Arc<[Source]>,
	query: Arc<Query>,
	source_query: SourceQuery,
	capability: Capability,
	observer: Arc<dyn SlotObserver>,
	cancel: CancellationToken,
}

/// Reports the slot as drained when dropped, whatever ends the slot.
struct DrainGuard {
	slot: usize,
	observer: Arc<dyn SlotObserver>,
}

impl Drop for DrainGuard {
	fn drop(&mut self) {
		self.observer.on_slot_drained(self.slot);
	}
}

async fn run_slot(ctx: SlotContext) {
	let _drained = DrainGuard {
		slot: ctx.slot,
		observer: Arc::clone(&ctx.observer),
	};

	loop {
		if ctx.cancel.is_cancelled() {
			tracing::trace!(slot = ctx.slot, "search.slot.cancelled");
			break;
		}

		let Some(index) = ctx.cursor.claim_next() else {
			tracing::trace!(slot = ctx.slot, "search.slot.drained");
			break;
		};
		let Some(source) = ctx.sources.get(index) else {
			break;
		};

		if !(ctx.capability)(source) {
			tracing::trace!(slot = ctx.slot, index, source = %source.id(), "search.source.skipped");
			continue;
		}

		match ctx.source_query.call(source, &ctx.query, index, &ctx.cancel).await {
			Ok(Some(candidate)) => ctx.observer.on_candidate(candidate),
			Ok(None) => {
				tracing::trace!(slot = ctx.slot, index, source = %source.id(), "search.source.empty");
			}
			Err(QueryError::Cancelled) => {
				tracing::trace!(slot = ctx.slot, index, source = %source.id(), "search.slot.cancelled");
				break;
			}
			Err(err) => {
				tracing::debug!(slot = ctx.slot, index, source = %source.id(), error = %err, "search.source.failed");
			}
		}
	}
}
