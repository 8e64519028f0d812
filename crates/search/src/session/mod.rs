//! Search lifecycle: start, stop, natural completion and cache-first open.
//!
//! A [`SearchSession`] is the long-lived handle. Every start builds a fresh
//! run (its own cancellation token, aggregator, publisher and drain latch),
//! so a cancelled run can never leak results into its successor. The run's
//! state moves `Searching -> Idle` on completion or `Searching -> Stopped` on
//! stop; both transitions happen under the run's state lock and only from
//! `Searching`, so exactly one of them reports.

use std::sync::Arc;

use parking_lot::Mutex;
use quarry_worker::{RunClock, RunToken};
use thiserror::Error;
use tokio::sync::watch;

use crate::aggregator::{Admission, ResultAggregator};
use crate::config::{ConfigError, SearchConfig};
use crate::cursor::DispatchCursor;
use crate::fetch::{Capability, SourceCatalog, SourceFetcher, supports_auxiliary};
use crate::model::{Candidate, Query, Source};
use crate::observer::SearchObserver;
use crate::pool::{DrainLatch, PoolHandle, SlotObserver, WorkerPool};
use crate::publisher::ThrottledPublisher;
use crate::query::SourceQuery;
use crate::store::{ResultStore, persist_in_background};

/// Observable state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
	/// No search has run yet, or the last one completed naturally.
	#[default]
	Idle,
	/// A run is dispatching sources.
	Searching,
	/// The last run was stopped by the caller.
	Stopped,
}

/// What a [`SearchSession::stop`] or [`SearchSession::open`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
	/// A new run was started.
	Started,
	/// The running search was stopped.
	Stopped,
	/// Enough stored results existed; they were published without searching.
	ServedFromCache,
}

/// Misuse of the session API.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
	#[error("a search is already running")]
	AlreadySearching,
}

/// Everything needed to build a [`SearchSession`].
pub struct SessionSpec {
	query: Query,
	catalog: Arc<dyn SourceCatalog>,
	fetcher: Arc<dyn SourceFetcher>,
	observer: Arc<dyn SearchObserver>,
	config: SearchConfig,
	store: Option<Arc<dyn ResultStore>>,
	capability: Capability,
}

impl SessionSpec {
	/// Creates a spec with default config, no store and the
	/// [`supports_auxiliary`] capability.
	pub fn new(query: Query, catalog: impl SourceCatalog, fetcher: Arc<dyn SourceFetcher>, observer: Arc<dyn SearchObserver>) -> Self {
		Self {
			query,
			catalog: Arc::new(catalog),
			fetcher,
			observer,
			config: SearchConfig::default(),
			store: None,
			capability: supports_auxiliary(),
		}
	}

	#[must_use]
	pub fn config(mut self, config: SearchConfig) -> Self {
		self.config = config;
		self
	}

	/// Persists accepted results to `store` and consults it in [`SearchSession::open`].
	#[must_use]
	pub fn store(mut self, store: Arc<dyn ResultStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Replaces the predicate deciding which sources are queried at all.
	#[must_use]
	pub fn capability(mut self, capability: Capability) -> Self {
		self.capability = capability;
		self
	}

	/// Validates the config and builds the session.
	pub fn build(self) -> Result<SearchSession, ConfigError> {
		SearchSession::new(self)
	}
}

/// Long-lived handle running searches for one query.
///
/// All methods are synchronous and may be called from any thread; slot tasks
/// are spawned on the ambient Tokio runtime, or the worker crate's global
/// runtime when there is none. Dropping the session cancels and aborts the
/// active run without further observer notifications.
///
/// Lock order: `active`, then the run's state, then the publisher, then
/// `latest`, then the aggregator. `latest` is a leaf read by
/// [`Self::results`], so observer callbacks may read results and state.
pub struct SearchSession {
	query: Arc<Query>,
	catalog: Arc<dyn SourceCatalog>,
	pool: WorkerPool,
	observer: Arc<dyn SearchObserver>,
	store: Option<Arc<dyn ResultStore>>,
	config: SearchConfig,
	clock: RunClock,
	state_tx: Arc<watch::Sender<SessionState>>,
	active: Mutex<Option<ActiveRun>>,
	latest: Mutex<Option<Arc<ResultAggregator>>>,
}

struct ActiveRun {
	run: Arc<SearchRun>,
	pool: Option<PoolHandle>,
}

impl SearchSession {
	/// Fails when the config does not pass [`SearchConfig::validate`].
	pub fn new(spec: SessionSpec) -> Result<Self, ConfigError> {
		spec.config.validate()?;
		let source_query = SourceQuery::new(spec.fetcher, spec.config.source_timeout());
		let pool = WorkerPool::new(source_query, spec.capability, spec.config.workers);
		let (state_tx, _) = watch::channel(SessionState::Idle);
		Ok(Self {
			query: Arc::new(spec.query),
			catalog: spec.catalog,
			pool,
			observer: spec.observer,
			store: spec.store,
			config: spec.config,
			clock: RunClock::new(),
			state_tx: Arc::new(state_tx),
			active: Mutex::new(None),
			latest: Mutex::new(None),
		})
	}

	pub fn query(&self) -> &Query {
		&self.query
	}

	pub fn config(&self) -> &SearchConfig {
		&self.config
	}

	pub fn state(&self) -> SessionState {
		*self.state_tx.borrow()
	}

	/// Watches state transitions.
	pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
		self.state_tx.subscribe()
	}

	/// Current results of the latest run, sorted by `origin_order`.
	pub fn results(&self) -> Vec<Candidate> {
		self.latest.lock().as_ref().map(|aggregator| aggregator.snapshot()).unwrap_or_default()
	}

	/// Starts a new run over a fresh snapshot of the catalog.
	pub fn start(&self) -> Result<(), SessionError> {
		let mut active = self.active.lock();
		if is_searching(&active) {
			return Err(SessionError::AlreadySearching);
		}
		self.launch(&mut active, Vec::new());
		Ok(())
	}

	/// Stops the running search, or starts one when none is running.
	pub fn stop(&self) -> SessionAction {
		let mut active = self.active.lock();
		if let Some(current) = active.as_ref()
			&& current.run.stop()
		{
			if let Some(pool) = &current.pool {
				pool.cancel();
			}
			return SessionAction::Stopped;
		}
		self.launch(&mut active, Vec::new());
		SessionAction::Started
	}

	/// Serves stored results when there are enough of them, otherwise starts
	/// a run that keeps the stored results visible.
	pub fn open(&self) -> Result<SessionAction, SessionError> {
		let mut active = self.active.lock();
		if is_searching(&active) {
			return Err(SessionError::AlreadySearching);
		}

		let cached = self.store.as_ref().map(|store| store.cached(&self.query)).unwrap_or_default();
		if cached.len() >= self.config.cache_fast_path {
			let run = self.new_run(0);
			let served = run.aggregator.seed(cached.iter().cloned());
			if served >= self.config.cache_fast_path {
				tracing::info!(generation = run.token.generation(), results = served, "search.session.cache_hit");
				*self.latest.lock() = Some(Arc::clone(&run.aggregator));
				run.serve_cached();
				*active = Some(ActiveRun { run, pool: None });
				return Ok(SessionAction::ServedFromCache);
			}
		}

		self.launch(&mut active, cached);
		Ok(SessionAction::Started)
	}

	fn new_run(&self, slots: usize) -> Arc<SearchRun> {
		let aggregator = Arc::new(ResultAggregator::new(Arc::clone(&self.query)));
		let publisher = ThrottledPublisher::new(Arc::clone(&aggregator), Arc::clone(&self.observer), self.config.publish_interval());
		Arc::new(SearchRun {
			token: RunToken::new(self.clock.next()),
			aggregator,
			publisher,
			latch: DrainLatch::new(slots),
			state: Mutex::new(SessionState::Idle),
			observer: Arc::clone(&self.observer),
			store: self.store.clone(),
			state_tx: Arc::clone(&self.state_tx),
		})
	}

	/// Replaces the active run with a new one. Caller holds `active` and has
	/// checked that nothing is searching.
	fn launch(&self, active: &mut Option<ActiveRun>, seed: Vec<Candidate>) {
		if let Some(previous) = active.take() {
			previous.run.token.cancel();
		}

		let sources: Arc<[Source]> = self.catalog.enabled_sources().into();
		let slots = self.pool.slots_for(sources.len());
		let run = self.new_run(slots);
		let seeded = run.aggregator.seed(seed);
		*self.latest.lock() = Some(Arc::clone(&run.aggregator));

		tracing::info!(
			generation = run.token.generation(),
			query = %self.query.name(),
			sources = sources.len(),
			slots,
			seeded,
			"search.session.started"
		);
		run.begin(seeded > 0);
		if slots == 0 {
			run.complete();
		}

		let cursor = Arc::new(DispatchCursor::new(sources.len()));
		let observer: Arc<dyn SlotObserver> = run.clone();
		let pool = self
			.pool
			.run(cursor, sources, Arc::clone(&self.query), observer, run.token.as_cancellation().clone());
		*active = Some(ActiveRun { run, pool: Some(pool) });
	}
}

fn is_searching(active: &Option<ActiveRun>) -> bool {
	active.as_ref().is_some_and(|current| current.run.is_searching())
}

impl Drop for SearchSession {
	fn drop(&mut self) {
		if let Some(active) = self.active.get_mut().take() {
			active.run.abandon();
		}
	}
}

/// State of one run, shared with its dispatch slots.
struct SearchRun {
	token: RunToken,
	aggregator: Arc<ResultAggregator>,
	publisher: ThrottledPublisher,
	latch: DrainLatch,
	state: Mutex<SessionState>,
	observer: Arc<dyn SearchObserver>,
	store: Option<Arc<dyn ResultStore>>,
	state_tx: Arc<watch::Sender<SessionState>>,
}

impl SearchRun {
	fn is_searching(&self) -> bool {
		*self.state.lock() == SessionState::Searching
	}

	fn begin(&self, seeded: bool) {
		let mut state = self.state.lock();
		*state = SessionState::Searching;
		self.state_tx.send_replace(SessionState::Searching);
		self.observer.on_searching_changed(true);
		if seeded {
			self.publisher.notify_changed();
		}
	}

	/// `Searching -> Stopped`. Returns false when the run was not searching.
	fn stop(&self) -> bool {
		let mut state = self.state.lock();
		if *state != SessionState::Searching {
			return false;
		}
		self.token.cancel();
		self.aggregator.close();
		*state = SessionState::Stopped;
		self.publisher.flush_final();
		self.state_tx.send_replace(SessionState::Stopped);
		self.observer.on_searching_changed(false);
		tracing::info!(generation = self.token.generation(), results = self.aggregator.len(), "search.session.stopped");
		true
	}

	/// `Searching -> Idle`. Returns false when the run was not searching.
	fn complete(&self) -> bool {
		let mut state = self.state.lock();
		if *state != SessionState::Searching {
			return false;
		}
		self.aggregator.close();
		*state = SessionState::Idle;
		self.publisher.flush_final();
		self.state_tx.send_replace(SessionState::Idle);
		self.observer.on_searching_changed(false);
		tracing::info!(generation = self.token.generation(), results = self.aggregator.len(), "search.session.completed");
		true
	}

	/// Publishes the seeded results as final without searching.
	fn serve_cached(&self) {
		let _state = self.state.lock();
		self.aggregator.close();
		self.publisher.flush_final();
		self.state_tx.send_replace(SessionState::Idle);
	}

	/// Tears the run down without notifying the observer.
	fn abandon(&self) {
		let mut state = self.state.lock();
		self.token.cancel();
		self.aggregator.close();
		self.publisher.retire();
		if *state == SessionState::Searching {
			*state = SessionState::Stopped;
			self.state_tx.send_replace(SessionState::Stopped);
			tracing::debug!(generation = self.token.generation(), "search.session.abandoned");
		}
	}
}

impl SlotObserver for SearchRun {
	fn on_candidate(&self, candidate: Candidate) {
		if self.token.is_cancelled() {
			tracing::trace!(generation = self.token.generation(), source = %candidate.source, "search.candidate.discarded");
			return;
		}

		let persisted = self.store.as_ref().map(|store| (Arc::clone(store), candidate.clone()));
		let source = candidate.source.clone();
		match self.aggregator.try_insert(candidate) {
			Admission::Inserted => {
				tracing::debug!(generation = self.token.generation(), %source, "search.candidate.accepted");
				if let Some((store, candidate)) = persisted {
					persist_in_background(store, candidate);
				}
				self.publisher.notify_changed();
			}
			admission => {
				tracing::trace!(generation = self.token.generation(), %source, ?admission, "search.candidate.ignored");
			}
		}
	}

	fn on_slot_drained(&self, slot: usize) {
		tracing::trace!(generation = self.token.generation(), slot, "search.slot.exited");
		if self.latch.mark_drained() {
			self.complete();
		}
	}
}
