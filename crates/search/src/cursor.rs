use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared, monotonically advancing index into the source snapshot.
///
/// Every index in `[0, total)` is handed out exactly once. The counter
/// saturates at `total`, so any number of callers may observe exhaustion
/// without pushing it further.
#[derive(Debug)]
pub struct DispatchCursor {
	next: AtomicUsize,
	total: usize,
}

impl DispatchCursor {
	pub fn new(total: usize) -> Self {
		Self {
			next: AtomicUsize::new(0),
			total,
		}
	}

	/// Claims the next unclaimed index, or `None` once the list is exhausted.
	pub fn claim_next(&self) -> Option<usize> {
		self.next
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |next| (next < self.total).then_some(next + 1))
			.ok()
	}

	pub const fn total(&self) -> usize {
		self.total
	}

	/// Number of indices handed out so far.
	pub fn claimed(&self) -> usize {
		self.next.load(Ordering::Acquire)
	}

	pub fn is_exhausted(&self) -> bool {
		self.claimed() >= self.total
	}
}
