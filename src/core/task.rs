//! Task trait and error types.
//!
//! A `Task` is a no-argument asynchronous unit of work: one execution of a
//! job's body, a supervised job, or a sequence of steps. Everything the
//! scheduler runs is a [`TaskRef`].

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::status::JobStatus;

/// Errors that can occur while running a task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task execution failed with a message.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// External command exited unsuccessfully.
    #[error("command exited with code {code}")]
    CommandFailed { code: i32, stderr: String },

    /// A tick arrived while the previous execution was still in flight.
    #[error("previous execution of job '{name}' has not completed (status: {status})")]
    PreviousExecutionNotComplete { name: String, status: JobStatus },

    /// The execution did not finish within the job's timeout.
    ///
    /// The task itself is not stopped and may still be running.
    #[error("job '{name}' timed out after {timeout:?} (status: {status})")]
    Timeout {
        name: String,
        status: JobStatus,
        timeout: Duration,
    },

    /// The task panicked while running on a spawned tokio task.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The job's error handler rejected the error it was given.
    #[error("error handler for job '{name}' failed: {source}")]
    ErrorHandler {
        name: String,
        #[source]
        source: Box<TaskError>,
    },

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    /// Whether this error was produced by the supervisor rather than the task body.
    pub fn is_supervision_error(&self) -> bool {
        matches!(
            self,
            TaskError::PreviousExecutionNotComplete { .. } | TaskError::Timeout { .. }
        )
    }
}

/// The core trait for runnable units of work.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use cadence::{Task, TaskError};
///
/// struct Ping;
///
/// #[async_trait]
/// impl Task for Ping {
///     fn name(&self) -> &str {
///         "ping"
///     }
///
///     async fn run(&self) -> Result<(), TaskError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Perform one execution.
    async fn run(&self) -> Result<(), TaskError>;
}

/// Shared, type-erased task.
pub type TaskRef = Arc<dyn Task>;

/// A [`Task`] backed by a closure returning a future.
pub struct TaskFn<F> {
    name: String,
    f: F,
}

impl<F, Fut> TaskFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    /// Wrap `f` as a task called `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Erase into a [`TaskRef`].
    pub fn into_ref(self) -> TaskRef {
        Arc::new(self)
    }
}

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        (self.f)().await
    }
}

/// Shorthand for `TaskFn::new(name, f).into_ref()`.
pub fn task_fn<F, Fut>(name: impl Into<String>, f: F) -> TaskRef
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    TaskFn::new(name, f).into_ref()
}
