//! Acceptance filter and insert-if-absent result set for one run.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::model::{Candidate, CandidateKey, Query};

/// Outcome of offering a candidate to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
	/// New entry; the result set changed.
	Inserted,
	/// Failed the acceptance predicate.
	Rejected,
	/// An equal entry from the same source is already present.
	Duplicate,
	/// The run was cancelled; nothing is accepted any more.
	Closed,
}

impl Admission {
	pub const fn is_inserted(self) -> bool {
		matches!(self, Self::Inserted)
	}
}

/// Returns true when `candidate` is an exact match for `query` and carries a
/// non-empty auxiliary value.
pub fn accepts(query: &Query, candidate: &Candidate) -> bool {
	candidate.name == query.name() && candidate.author == query.author() && candidate.has_auxiliary()
}

#[derive(Debug, Default)]
struct Entries {
	entries: IndexMap<CandidateKey, Candidate>,
	closed: bool,
}

/// Thread-safe result set keyed by `(name, author, source)`.
///
/// Acceptance is checked outside the lock; the closed check, duplicate check
/// and insert happen in one critical section, so after [`Self::close`]
/// returns no further insert can land.
#[derive(Debug)]
pub struct ResultAggregator {
	query: Arc<Query>,
	inner: Mutex<Entries>,
}

impl ResultAggregator {
	pub fn new(query: Arc<Query>) -> Self {
		Self {
			query,
			inner: Mutex::new(Entries::default()),
		}
	}

	pub fn query(&self) -> &Query {
		&self.query
	}

	/// Offers one candidate from a dispatch slot.
	pub fn try_insert(&self, candidate: Candidate) -> Admission {
		if !accepts(&self.query, &candidate) {
			return Admission::Rejected;
		}

		let mut inner = self.inner.lock();
		if inner.closed {
			return Admission::Closed;
		}
		let key = candidate.key();
		if inner.entries.contains_key(&key) {
			return Admission::Duplicate;
		}
		inner.entries.insert(key, candidate);
		Admission::Inserted
	}

	/// Seeds previously stored candidates before any slot runs. Returns the
	/// number of entries added.
	pub fn seed(&self, candidates: impl IntoIterator<Item = Candidate>) -> usize {
		let mut inner = self.inner.lock();
		let before = inner.entries.len();
		for candidate in candidates {
			if accepts(&self.query, &candidate) {
				inner.entries.entry(candidate.key()).or_insert(candidate);
			}
		}
		inner.entries.len() - before
	}

	/// Seals the set. Every later [`Self::try_insert`] returns [`Admission::Closed`].
	pub fn close(&self) {
		self.inner.lock().closed = true;
	}

	pub fn is_closed(&self) -> bool {
		self.inner.lock().closed
	}

	pub fn len(&self) -> usize {
		self.inner.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Copies the entries sorted by `origin_order`. Ties keep insertion order.
	pub fn snapshot(&self) -> Vec<Candidate> {
		let mut out: Vec<Candidate> = self.inner.lock().entries.values().cloned().collect();
		out.sort_by_key(|candidate| candidate.origin_order);
		out
	}
}
