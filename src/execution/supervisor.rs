//! Job supervision.
//!
//! [`prepare`] wraps a job's task with:
//! - Overlap rejection: a run that finds the job already `Running` never
//!   invokes the task and fails with `PreviousExecutionNotComplete`
//! - An optional deadline raced against the task
//! - Lifecycle hooks (`before`, `after`) and error routing (`on_error`)
//!
//! # Error routing
//!
//! With an `on_error` handler installed, every failure (overlap, timeout or
//! the task's own error) is handed to the handler and the run completes with
//! `Ok(())`. Without one, the run returns the error to its caller, which for a
//! cycle means cancelling the whole group.
//!
//! # Timeouts
//!
//! A timed-out task is detached, not aborted. The supervisor stops waiting
//! and marks the job `Error`, but the task keeps running in the background and
//! its eventual result is discarded. Do not rely on a timeout for cleanup.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;

use crate::core::job::{Job, JobInfo};
use crate::core::status::JobStatus;
use crate::core::task::{Task, TaskError, TaskRef};

/// Notification hook invoked with a snapshot of the job.
pub type Hook = Arc<dyn Fn(&JobInfo) + Send + Sync>;

/// Handler that absorbs a job failure.
///
/// Returning `Err` turns the failure back into a hard failure, reported as
/// [`TaskError::ErrorHandler`].
pub type ErrorHandler = Arc<dyn Fn(&JobInfo, &TaskError) -> Result<(), TaskError> + Send + Sync>;

/// Optional lifecycle callbacks for a supervised job.
#[derive(Clone, Default)]
pub struct Hooks {
    before: Option<Hook>,
    after: Option<Hook>,
    on_error: Option<ErrorHandler>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl Hooks {
    /// No hooks: failures propagate to the caller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after the execution slot is claimed, before the task runs.
    ///
    /// The claim comes first, so the hook always sees `JobStatus::Running`.
    /// A rejected overlapping run never reaches this hook.
    pub fn before(mut self, hook: impl Fn(&JobInfo) + Send + Sync + 'static) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Called after a successful execution.
    pub fn after(mut self, hook: impl Fn(&JobInfo) + Send + Sync + 'static) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }

    /// Install an error handler, making failures soft.
    pub fn on_error(
        mut self,
        handler: impl Fn(&JobInfo, &TaskError) -> Result<(), TaskError> + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Whether failures are absorbed by an error handler.
    pub fn has_error_handler(&self) -> bool {
        self.on_error.is_some()
    }
}

/// Wrap `job` with overlap guarding, its timeout and `hooks`.
///
/// The job is moved into the returned runnable, whose status cell it now
/// exclusively owns.
pub fn prepare(job: Job, hooks: Hooks) -> Prepared {
    Prepared {
        inner: Arc::new(Inner { job, hooks }),
    }
}

struct Inner {
    job: Job,
    hooks: Hooks,
}

/// A supervised job, runnable any number of times.
///
/// Clones share the same job and status.
#[derive(Clone)]
pub struct Prepared {
    inner: Arc<Inner>,
}

impl fmt::Debug for Prepared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prepared")
            .field("job", &self.inner.job)
            .field("hooks", &self.inner.hooks)
            .finish()
    }
}

impl Prepared {
    /// The supervised job.
    pub fn job(&self) -> &Job {
        &self.inner.job
    }

    /// Current status of the supervised job.
    pub fn status(&self) -> JobStatus {
        self.inner.job.status()
    }

    /// Snapshot of the supervised job.
    pub fn info(&self) -> JobInfo {
        self.inner.job.info()
    }

    /// Erase into a [`TaskRef`].
    pub fn into_ref(self) -> TaskRef {
        Arc::new(self)
    }

    /// A job for a cycle whose body is this supervised runnable.
    ///
    /// Name, interval and defer are taken from the supervised job. The timeout
    /// is already enforced here, so the returned job carries none.
    pub fn to_job(&self) -> Job {
        let job = &self.inner.job;
        let scheduled = Job::new(job.name(), job.interval(), self.clone().into_ref());
        match job.defer() {
            Some(defer) => scheduled.with_defer(defer),
            None => scheduled,
        }
    }

    /// Run the task once, bounded by the job's timeout if it has one.
    async fn execute(&self) -> Result<(), TaskError> {
        let job = &self.inner.job;
        let Some(limit) = job.timeout() else {
            return job.task().run().await;
        };

        let task = Arc::clone(job.task());
        let mut handle = tokio::spawn(async move { task.run().await });

        tokio::select! {
            joined = &mut handle => joined.unwrap_or_else(|e| Err(join_error(e))),
            _ = tokio::time::sleep(limit) => {
                // Dropping the handle detaches the task; it is not aborted.
                drop(handle);
                Err(TaskError::Timeout {
                    name: job.name().to_string(),
                    status: job.status(),
                    timeout: limit,
                })
            }
        }
    }

    /// Hand `err` to the error handler, or return it.
    fn route_failure(&self, err: TaskError) -> Result<(), TaskError> {
        let job = &self.inner.job;
        match &self.inner.hooks.on_error {
            Some(handler) => handler(&job.info(), &err).map_err(|source| {
                tracing::warn!(job = %job.name(), error = %source, "Error handler failed");
                TaskError::ErrorHandler {
                    name: job.name().to_string(),
                    source: Box::new(source),
                }
            }),
            None => Err(err),
        }
    }
}

#[async_trait]
impl Task for Prepared {
    fn name(&self) -> &str {
        self.inner.job.name()
    }

    async fn run(&self) -> Result<(), TaskError> {
        let job = &self.inner.job;
        let hooks = &self.inner.hooks;

        if let Err(status) = job.status_cell().try_begin() {
            tracing::warn!(job = %job.name(), %status, "Previous execution not complete, skipping");
            return self.route_failure(TaskError::PreviousExecutionNotComplete {
                name: job.name().to_string(),
                status,
            });
        }

        if let Some(before) = &hooks.before {
            before(&job.info());
        }

        let start = Instant::now();
        match self.execute().await {
            Ok(()) => {
                job.status_cell().store(JobStatus::Pending);
                tracing::debug!(job = %job.name(), duration = ?start.elapsed(), "Job execution completed");
                if let Some(after) = &hooks.after {
                    after(&job.info());
                }
                Ok(())
            }
            Err(err) => {
                job.status_cell().store(JobStatus::Error);
                log_failure(job.name(), &err, start.elapsed());
                self.route_failure(err)
            }
        }
    }
}

fn log_failure(name: &str, err: &TaskError, elapsed: Duration) {
    match err {
        TaskError::Timeout { .. } => {
            tracing::warn!(job = %name, error = %err, "Job execution timed out; task left running")
        }
        _ => tracing::debug!(job = %name, error = %err, duration = ?elapsed, "Job execution failed"),
    }
}

pub(crate) fn join_error(err: JoinError) -> TaskError {
    if err.is_panic() {
        TaskError::Panicked(err.to_string())
    } else {
        TaskError::ExecutionFailed(format!("task was cancelled: {err}"))
    }
}
