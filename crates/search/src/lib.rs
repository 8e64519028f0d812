//! Bounded fan-out search across an ordered list of remote sources.
//!
//! A [`SearchSession`] asks every enabled [`Source`] the same [`Query`] with at
//! most eight concurrent dispatch slots, filters and deduplicates what comes
//! back, and publishes a throttled, `origin_order`-sorted result list to a
//! [`SearchObserver`]. Sessions can be stopped and restarted at any time.
//!
//! The pieces, leaves first:
//! * [`SourceQuery`]: one cancellable, time-limited call into the fetch layer
//! * [`DispatchCursor`]: lock-free "next source" hand-out
//! * [`WorkerPool`]: N slots draining the cursor
//! * [`ResultAggregator`]: acceptance filter plus insert-if-absent set
//! * [`ThrottledPublisher`]: coalesced observer notifications
//! * [`SearchSession`]: run lifecycle, cancellation and completion

pub mod aggregator;
pub mod config;
pub mod cursor;
pub mod fetch;
pub mod model;
pub mod observer;
pub mod pool;
pub mod publisher;
pub mod query;
pub mod scripted;
pub mod session;
pub mod store;

pub use aggregator::{Admission, ResultAggregator, accepts};
pub use config::{ConfigError, SearchConfig};
pub use cursor::DispatchCursor;
pub use fetch::{Capability, FetchError, SourceCatalog, SourceFetcher, supports_auxiliary};
pub use model::{Candidate, CandidateKey, Query, SearchHit, Source, SourceId};
pub use observer::SearchObserver;
pub use pool::{DrainLatch, MAX_WORKERS, PoolHandle, SlotObserver, WorkerPool};
pub use publisher::ThrottledPublisher;
pub use query::{QueryError, SourceQuery};
pub use session::{SearchSession, SessionAction, SessionError, SessionSpec, SessionState};
pub use store::{MemoryStore, ResultStore, StoreError};

#[cfg(test)]
use tracing_subscriber as _;
