//! Cadence runs named jobs on fixed intervals.
//!
//! - [`prepare`] supervises a single job: overlapping executions are rejected,
//!   an optional timeout is raced against the task, and failures are either
//!   absorbed by an error handler or returned to the caller.
//! - [`Cycle`] (or [`run`]) drives many jobs concurrently, each on its own
//!   timer, and cancels every timer on the first unhandled failure.
//! - [`sequence`] composes tasks into one that runs them strictly in order.
//!
//! ```no_run
//! use std::time::Duration;
//! use cadence::{Hooks, Job, prepare, run, task_fn};
//!
//! # async fn demo() {
//! let heartbeat = Job::new("heartbeat", Duration::from_secs(5), task_fn("heartbeat", || async {
//!     Ok(())
//! }))
//! .with_timeout(Duration::from_secs(1));
//!
//! let supervised = prepare(heartbeat, Hooks::new()).to_job();
//! let err = run([supervised]).await.unwrap_err();
//! eprintln!("cycle cancelled: {err}");
//! # }
//! ```
//!
//! [`Cycle::run`] does not supervise jobs on its own. Wrap a job with
//! [`prepare`] to get overlap rejection and timeouts on every tick.

pub mod config;
pub mod core;
pub mod events;
pub mod execution;
pub mod scheduler;
pub mod testing;

pub use core::job::{Job, JobBuilder, JobError, JobInfo};
pub use core::status::JobStatus;
pub use core::task::{Task, TaskError, TaskFn, TaskRef, task_fn};
pub use core::types::{CycleId, JobId};
pub use events::{Event, EventBus, EventHandler};
pub use execution::{
    CommandTask, CommandTaskBuilder, ErrorHandler, Hook, Hooks, Prepared, Sequence, prepare,
    sequence,
};
pub use scheduler::{Cycle, CycleError, CycleHandle, CycleState, run};
