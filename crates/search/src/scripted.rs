//! A fetcher that answers from a per-source script.
//!
//! Used by the demo binary and by tests to stand in for real remote sources:
//! each source gets a delay and a canned [`Reply`]. Sources without a script
//! answer empty immediately.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::fetch::{FetchError, SourceFetcher};
use crate::model::{Query, SearchHit, Source, SourceId};

/// Canned answer for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
	/// Answer with these hits, in order.
	Hits(Vec<SearchHit>),
	/// Answer with no hits.
	Empty,
	/// Fail with a transport error.
	Fail(String),
	/// Never answer.
	Hang,
}

impl Reply {
	/// One hit with an auxiliary value.
	pub fn hit(name: impl Into<String>, author: impl Into<String>, auxiliary: impl Into<String>) -> Self {
		Self::Hits(vec![SearchHit::new(name, author, Some(auxiliary.into()))])
	}
}

#[derive(Debug, Clone)]
struct Script {
	delay: Duration,
	reply: Reply,
}

/// [`SourceFetcher`] driven by per-source scripts.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
	scripts: HashMap<SourceId, Script>,
	deaf: HashSet<SourceId>,
	calls: Mutex<Vec<SourceId>>,
	in_flight: AtomicUsize,
	max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Scripts `source` to answer `reply` after `delay`.
	#[must_use]
	pub fn reply(mut self, source: impl Into<SourceId>, delay: Duration, reply: Reply) -> Self {
		self.scripts.insert(source.into(), Script { delay, reply });
		self
	}

	/// Scripts `source` to answer several hits after `delay`.
	#[must_use]
	pub fn reply_many(self, source: impl Into<SourceId>, delay: Duration, hits: Vec<SearchHit>) -> Self {
		self.reply(source, delay, Reply::Hits(hits))
	}

	/// Makes `source` ignore the cancellation token and answer on schedule.
	#[must_use]
	pub fn ignore_cancellation(mut self, source: impl Into<SourceId>) -> Self {
		self.deaf.insert(source.into());
		self
	}

	/// Sources called so far, in call order.
	pub fn calls(&self) -> Vec<SourceId> {
		self.calls.lock().clone()
	}

	/// Calls currently waiting on their script.
	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::Acquire)
	}

	/// Highest number of simultaneous calls observed.
	pub fn max_in_flight(&self) -> usize {
		self.max_in_flight.load(Ordering::Acquire)
	}
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::AcqRel);
	}
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
	async fn search(&self, source: &Source, _query: &Query, cancel: CancellationToken) -> Result<Vec<SearchHit>, FetchError> {
		self.calls.lock().push(source.id().clone());
		let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
		self.max_in_flight.fetch_max(now, Ordering::AcqRel);
		let _in_flight = InFlight(&self.in_flight);

		let Some(script) = self.scripts.get(source.id()).cloned() else {
			return Ok(Vec::new());
		};

		let wait = async {
			match script.reply {
				Reply::Hang => std::future::pending::<()>().await,
				_ => tokio::time::sleep(script.delay).await,
			}
		};

		if self.deaf.contains(source.id()) {
			wait.await;
		} else {
			tokio::select! {
				_ = cancel.cancelled() => return Err(FetchError::Transport("request aborted".into())),
				_ = wait => {}
			}
		}

		match script.reply {
			Reply::Hits(hits) => Ok(hits),
			Reply::Empty | Reply::Hang => Ok(Vec::new()),
			Reply::Fail(reason) => Err(FetchError::Transport(reason)),
		}
	}
}
