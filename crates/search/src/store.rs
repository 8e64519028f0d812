//! Optional persistence of accepted candidates.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use quarry_worker::TaskClass;
use thiserror::Error;

use crate::aggregator::accepts;
use crate::model::{Candidate, CandidateKey, Query, SourceId};

/// Failure of the persistence layer. Never surfaces to the session.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("failed to persist result from {origin}: {reason}")]
	Persist { origin: SourceId, reason: String },
}

/// Storage for accepted candidates, consulted by the cache-first open path.
///
/// Methods are blocking; the session calls `persist` on the blocking pool.
pub trait ResultStore: Send + Sync + 'static {
	/// Previously stored candidates acceptable for `query`.
	fn cached(&self, query: &Query) -> Vec<Candidate>;

	/// Stores one accepted candidate.
	fn persist(&self, candidate: &Candidate) -> Result<(), StoreError>;
}

/// In-process [`ResultStore`] keyed like the aggregator.
#[derive(Debug, Default)]
pub struct MemoryStore {
	records: Mutex<IndexMap<CandidateKey, Candidate>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store preloaded with `records`.
	pub fn with_records(records: impl IntoIterator<Item = Candidate>) -> Self {
		let records = records.into_iter().map(|candidate| (candidate.key(), candidate)).collect();
		Self { records: Mutex::new(records) }
	}

	pub fn len(&self) -> usize {
		self.records.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Copies every stored record in insertion order.
	pub fn records(&self) -> Vec<Candidate> {
		self.records.lock().values().cloned().collect()
	}
}

impl ResultStore for MemoryStore {
	fn cached(&self, query: &Query) -> Vec<Candidate> {
		self.records.lock().values().filter(|candidate| accepts(query, candidate)).cloned().collect()
	}

	fn persist(&self, candidate: &Candidate) -> Result<(), StoreError> {
		self.records.lock().insert(candidate.key(), candidate.clone());
		Ok(())
	}
}

/// Hands `candidate` to `store` on the blocking pool and logs failures.
pub(crate) fn persist_in_background(store: Arc<dyn ResultStore>, candidate: Candidate) {
	drop(quarry_worker::spawn_blocking(TaskClass::Persist, move || {
		if let Err(err) = store.persist(&candidate) {
			tracing::warn!(source = %candidate.source, error = %err, "search.store.persist_failed");
		}
	}));
}
