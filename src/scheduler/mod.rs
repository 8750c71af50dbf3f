//! Cycle orchestration.
//!
//! This module drives a group of jobs, each on its own repeating timer, and
//! cancels the whole group on the first unhandled failure.

mod engine;
mod handle;
mod types;

pub use engine::{Cycle, run};
pub use handle::CycleHandle;
pub use types::{CycleError, CycleState};
