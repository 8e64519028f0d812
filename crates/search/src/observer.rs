use crate::model::Candidate;

/// Receives published results and searching-state changes.
///
/// Callbacks run synchronously on scheduler tasks and on the caller of
/// `start`/`stop`/`open` while run locks are held, so notifications arrive in
/// order. An implementation must return quickly. It may read the owning
/// [`SearchSession`] (`results`, `state`, `query`, `config`) but must not call
/// `start`, `stop` or `open` or drop the session; hand those off to another
/// task instead.
///
/// [`SearchSession`]: crate::SearchSession
pub trait SearchObserver: Send + Sync + 'static {
	/// A new result list, sorted by `origin_order`.
	fn on_results_changed(&self, results: Vec<Candidate>);

	/// The session entered (`true`) or left (`false`) the searching state.
	fn on_searching_changed(&self, searching: bool);
}
