//! Job lifecycle status.
//!
//! A job's status doubles as its execution slot: the supervisor claims the slot
//! by moving the status to [`JobStatus::Running`], and only one claim can
//! succeed at a time. The claim is a single atomic read-modify-write, so the
//! guard holds on a multi-threaded runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Last observed lifecycle state of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Never run.
    #[default]
    Unset,
    /// Idle, ready for the next tick.
    Pending,
    /// An execution is in flight.
    Running,
    /// The last execution failed.
    Error,
}

impl JobStatus {
    fn to_u8(self) -> u8 {
        match self {
            JobStatus::Unset => 0,
            JobStatus::Pending => 1,
            JobStatus::Running => 2,
            JobStatus::Error => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => JobStatus::Pending,
            2 => JobStatus::Running,
            3 => JobStatus::Error,
            _ => JobStatus::Unset,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Unset => "unset",
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Atomic holder for a [`JobStatus`].
#[derive(Debug, Default)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    /// Create a cell holding `status`.
    pub fn new(status: JobStatus) -> Self {
        Self(AtomicU8::new(status.to_u8()))
    }

    /// Read the current status.
    pub fn load(&self) -> JobStatus {
        JobStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Overwrite the current status.
    pub fn store(&self, status: JobStatus) {
        self.0.store(status.to_u8(), Ordering::Release);
    }

    /// Claim the execution slot.
    ///
    /// Moves the status to `Running` unless it already is. Returns the status
    /// that was replaced on success, or `Running` if the slot is taken.
    pub fn try_begin(&self) -> Result<JobStatus, JobStatus> {
        let running = JobStatus::Running.to_u8();
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != running).then_some(running)
            })
            .map(JobStatus::from_u8)
            .map_err(JobStatus::from_u8)
    }
}
