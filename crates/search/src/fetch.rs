//! Collaborator seams: where sources come from and how one is queried.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model::{Query, SearchHit, Source};

/// Failure of one source call. Never fatal to a search.
#[derive(Debug, Error)]
pub enum FetchError {
	/// Network or protocol failure talking to the source.
	#[error("transport failure: {0}")]
	Transport(String),

	/// The response could not be parsed into hits.
	#[error("parse failure: {0}")]
	Parse(String),

	/// The source's extraction rules are unusable.
	#[error("source rule misconfigured: {0}")]
	Rule(String),
}

/// Fetch-and-parse layer for one source.
///
/// Implementations return the hits in source order; only the first one is
/// considered. `cancel` fires when the owning search is stopped and should be
/// honored promptly, although callers never wait on a cancelled call.
#[async_trait]
pub trait SourceFetcher: Send + Sync + 'static {
	async fn search(&self, source: &Source, query: &Query, cancel: CancellationToken) -> Result<Vec<SearchHit>, FetchError>;
}

/// Supplies the ordered list of enabled sources, snapshotted at each start.
pub trait SourceCatalog: Send + Sync + 'static {
	fn enabled_sources(&self) -> Vec<Source>;
}

impl SourceCatalog for Vec<Source> {
	fn enabled_sources(&self) -> Vec<Source> {
		self.clone()
	}
}

impl SourceCatalog for Arc<[Source]> {
	fn enabled_sources(&self) -> Vec<Source> {
		self.to_vec()
	}
}

/// Predicate deciding whether a source can answer the query at all.
pub type Capability = Arc<dyn Fn(&Source) -> bool + Send + Sync>;

/// Default capability: the source can produce the auxiliary field.
pub fn supports_auxiliary() -> Capability {
	Arc::new(Source::supports_auxiliary)
}
