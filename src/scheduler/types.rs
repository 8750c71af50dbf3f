//! Cycle type definitions.
//!
//! This module contains the error type and state enum for cycles.

use crate::core::task::TaskError;
use crate::core::types::JobId;
use thiserror::Error;

/// Errors that can end a cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The cycle was started without any jobs.
    #[error("cycle has no jobs")]
    NoJobs,

    /// A job's tick failed with an unhandled error; every timer was stopped.
    #[error("job '{job}' failed: {source}")]
    JobFailed {
        job: JobId,
        #[source]
        source: TaskError,
    },

    /// Channel error.
    #[error("channel error: {0}")]
    ChannelError(String),
}

impl CycleError {
    /// The job whose failure cancelled the cycle, if any.
    pub fn job(&self) -> Option<&JobId> {
        match self {
            CycleError::JobFailed { job, .. } => Some(job),
            _ => None,
        }
    }
}

/// State of a spawned cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Timers are armed and ticking.
    Running,
    /// The cycle was stopped through its handle.
    Stopped,
    /// A job failed and the cycle was cancelled.
    Failed,
}
