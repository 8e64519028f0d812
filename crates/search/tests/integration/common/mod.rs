//! Shared helpers for search integration tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use quarry_search::scripted::Reply;
use quarry_search::{Candidate, Query, SearchObserver, SearchSession, SessionState, Source};

/// One observer callback, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
	Results(Vec<Candidate>),
	Searching(bool),
}

/// Observer recording every callback.
#[derive(Debug, Default)]
pub struct RecordingObserver {
	seen: Mutex<Vec<Seen>>,
}

impl RecordingObserver {
	pub fn new() -> Arc<Self> {
		let _ = tracing_subscriber::fmt::try_init();
		Arc::new(Self::default())
	}

	pub fn seen(&self) -> Vec<Seen> {
		self.seen.lock().clone()
	}

	/// Searching-state changes only.
	pub fn toggles(&self) -> Vec<bool> {
		self.seen()
			.into_iter()
			.filter_map(|seen| match seen {
				Seen::Searching(value) => Some(value),
				Seen::Results(_) => None,
			})
			.collect()
	}

	/// Every published list, reduced to source ids.
	pub fn published(&self) -> Vec<Vec<String>> {
		self.seen()
			.into_iter()
			.filter_map(|seen| match seen {
				Seen::Results(results) => Some(results.iter().map(|c| c.source.to_string()).collect()),
				Seen::Searching(_) => None,
			})
			.collect()
	}

	pub fn last_published(&self) -> Option<Vec<String>> {
		self.published().pop()
	}
}

impl SearchObserver for RecordingObserver {
	fn on_results_changed(&self, results: Vec<Candidate>) {
		self.seen.lock().push(Seen::Results(results));
	}

	fn on_searching_changed(&self, searching: bool) {
		self.seen.lock().push(Seen::Searching(searching));
	}
}

pub fn query() -> Query {
	Query::new("The Long Road", "作者：Ann Vale")
}

/// A reply that passes the acceptance filter for [`query`].
pub fn good() -> Reply {
	Reply::hit("The Long Road", "Ann Vale", "https://covers.example/long-road.jpg")
}

pub fn named_sources(ids: &[&str]) -> Vec<Source> {
	ids.iter().map(|id| Source::new(*id, id.to_uppercase(), true)).collect()
}

/// Waits until the session leaves `Searching`.
pub async fn settle(session: &SearchSession) -> SessionState {
	let mut rx = session.subscribe_state();
	let state = *rx.wait_for(|state| *state != SessionState::Searching).await.expect("state sender alive");
	state
}

/// Polls `f` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
	let start = tokio::time::Instant::now();
	while start.elapsed() < timeout {
		if f() {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	f()
}
