//! Task execution.
//!
//! This module provides the building blocks that turn plain tasks into
//! runnables: supervision of a single job, sequential composition, and
//! external command execution.

mod command;
mod sequence;
mod supervisor;

pub use command::{CommandTask, CommandTaskBuilder};
pub use sequence::{Sequence, sequence};
pub use supervisor::{ErrorHandler, Hook, Hooks, Prepared, prepare};
pub(crate) use supervisor::join_error;
