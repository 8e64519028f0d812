//! Task runtime primitives shared by the search scheduler.
//!
//! * [`spawn`] / [`spawn_blocking`]: classified spawning on the ambient Tokio
//!   runtime, falling back to a lazily built global runtime
//! * [`TaskGroup`]: a set of sibling tasks sharing one cancellation token,
//!   torn down when the group is dropped
//! * [`DelayedTask`]: a cancellable "run this later" timer task
//! * [`RunClock`] / [`RunToken`]: generation-scoped cancellation for runs

mod class;
mod delayed;
mod group;
mod spawn;
mod token;

pub use class::TaskClass;
pub use delayed::DelayedTask;
pub use group::TaskGroup;
pub use spawn::{current_handle, spawn, spawn_blocking};
pub use token::{RunClock, RunToken};
pub use tokio_util::sync::CancellationToken;
