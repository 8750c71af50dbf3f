//! Job descriptor.
//!
//! A `Job` pairs a task with its scheduling parameters: the interval between
//! starts, an optional startup defer and an optional per-execution timeout.
//! It also carries the status cell that the wrapping supervisor owns.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::status::{JobStatus, StatusCell};
use super::task::TaskRef;
use super::types::JobId;

/// Errors that can occur when building jobs.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job name is empty.
    #[error("job name cannot be empty")]
    EmptyName,

    /// Interval is zero.
    #[error("invalid interval for job '{0}': must be greater than zero")]
    InvalidInterval(String),

    /// Timeout is zero.
    #[error("invalid timeout for job '{0}': must be greater than zero")]
    InvalidTimeout(String),

    /// No task was provided.
    #[error("job '{0}' has no task")]
    MissingTask(String),
}

/// Read-only view of a job handed to lifecycle hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    /// Job name.
    pub name: String,
    /// Status at the time the snapshot was taken.
    pub status: JobStatus,
}

/// A named unit of periodic work.
pub struct Job {
    name: String,
    task: TaskRef,
    interval: Duration,
    defer: Option<Duration>,
    timeout: Option<Duration>,
    status: StatusCell,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("task", &self.task.name())
            .field("interval", &self.interval)
            .field("defer", &self.defer)
            .field("timeout", &self.timeout)
            .field("status", &self.status.load())
            .finish()
    }
}

impl Job {
    /// Create a new job running `task` every `interval`.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero. Use `JobBuilder` if you need error handling.
    pub fn new(name: impl Into<String>, interval: Duration, task: TaskRef) -> Self {
        assert!(!interval.is_zero(), "interval cannot be zero");
        Self {
            name: name.into(),
            task,
            interval,
            defer: None,
            timeout: None,
            status: StatusCell::default(),
        }
    }

    /// Create a builder.
    pub fn builder(name: impl Into<String>) -> JobBuilder {
        JobBuilder::new(name)
    }

    /// Wait `defer` once before the first execution.
    pub fn with_defer(mut self, defer: Duration) -> Self {
        self.defer = Some(defer);
        self
    }

    /// Bound each execution to `timeout`.
    ///
    /// # Panics
    ///
    /// Panics if `timeout` is zero.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        assert!(!timeout.is_zero(), "timeout cannot be zero");
        self.timeout = Some(timeout);
        self
    }

    /// Get the job name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the identifier derived from the name.
    pub fn id(&self) -> JobId {
        JobId::new(&self.name)
    }

    /// Get the task.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Get the interval between starts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Get the startup defer, if any.
    pub fn defer(&self) -> Option<Duration> {
        self.defer
    }

    /// Get the execution timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Get the current status.
    pub fn status(&self) -> JobStatus {
        self.status.load()
    }

    pub(crate) fn status_cell(&self) -> &StatusCell {
        &self.status
    }

    /// Snapshot of the name and current status.
    pub fn info(&self) -> JobInfo {
        JobInfo {
            name: self.name.clone(),
            status: self.status.load(),
        }
    }

    /// An independent copy sharing the same task, with status seeded to `Pending`.
    pub fn working_copy(&self) -> Job {
        Job {
            name: self.name.clone(),
            task: Arc::clone(&self.task),
            interval: self.interval,
            defer: self.defer,
            timeout: self.timeout,
            status: StatusCell::new(JobStatus::Pending),
        }
    }
}

/// Builder for [`Job`] with validation.
pub struct JobBuilder {
    name: String,
    task: Option<TaskRef>,
    interval: Duration,
    defer: Option<Duration>,
    timeout: Option<Duration>,
}

impl JobBuilder {
    /// Create a new job builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task: None,
            interval: Duration::ZERO,
            defer: None,
            timeout: None,
        }
    }

    /// Set the task.
    pub fn task(mut self, task: TaskRef) -> Self {
        self.task = Some(task);
        self
    }

    /// Set the interval between starts.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the startup defer.
    pub fn defer(mut self, defer: Duration) -> Self {
        self.defer = Some(defer);
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the job.
    pub fn build(self) -> Result<Job, JobError> {
        if self.name.trim().is_empty() {
            return Err(JobError::EmptyName);
        }
        if self.interval.is_zero() {
            return Err(JobError::InvalidInterval(self.name));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(JobError::InvalidTimeout(self.name));
        }
        let task = self
            .task
            .ok_or_else(|| JobError::MissingTask(self.name.clone()))?;

        Ok(Job {
            name: self.name,
            task,
            interval: self.interval,
            defer: self.defer,
            timeout: self.timeout,
            status: StatusCell::default(),
        })
    }
}
