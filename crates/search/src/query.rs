//! One cancellable, time-limited call into the fetch layer.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::fetch::{FetchError, SourceFetcher};
use crate::model::{Candidate, Query, Source};

/// Why a source call produced nothing.
#[derive(Debug, Error)]
pub enum QueryError {
	#[error(transparent)]
	Fetch(#[from] FetchError),

	#[error("source did not answer within {0:?}")]
	TimedOut(Duration),

	#[error("search cancelled")]
	Cancelled,
}

/// Calls a source through the fetcher, racing cancellation and a timeout.
#[derive(Clone)]
pub struct SourceQuery {
	fetcher: Arc<dyn SourceFetcher>,
	timeout: Duration,
}

impl SourceQuery {
	pub fn new(fetcher: Arc<dyn SourceFetcher>, timeout: Duration) -> Self {
		Self { fetcher, timeout }
	}

	pub const fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Asks `source` about `query`, returning the first hit as a candidate
	/// stamped with `origin_order`.
	///
	/// Cancellation wins every race: once `cancel` fires the fetch future is
	/// dropped and its eventual answer can never be observed.
	pub async fn call(&self, source: &Source, query: &Query, origin_order: usize, cancel: &CancellationToken) -> Result<Option<Candidate>, QueryError> {
		if cancel.is_cancelled() {
			return Err(QueryError::Cancelled);
		}

		let fetch = self.fetcher.search(source, query, cancel.clone());
		let hits = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(QueryError::Cancelled),
			res = tokio::time::timeout(self.timeout, fetch) => match res {
				Ok(hits) => hits?,
				Err(_) => return Err(QueryError::TimedOut(self.timeout)),
			},
		};

		Ok(hits.into_iter().next().map(|hit| Candidate::from_hit(hit, source, origin_order)))
	}
}
