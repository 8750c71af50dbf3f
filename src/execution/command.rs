//! External command task implementation.
//!
//! [`CommandTask`] runs an external program as a job body. Output is captured:
//! stdout is logged at debug level after a successful run, and stderr is carried
//! in [`TaskError::CommandFailed`] when the program exits unsuccessfully.
//!
//! ```rust
//! use cadence::CommandTask;
//!
//! let task = CommandTask::builder("curl")
//!     .name("health_check")
//!     .args(["-fsS", "http://localhost:8080/health"])
//!     .env("NO_PROXY", "localhost")
//!     .build();
//! ```
//!
//! Timeouts belong to the job, not the command: wrap the job with
//! [`prepare`](crate::prepare). A timed-out command is left running.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use crate::core::task::{Task, TaskError};

/// A task that executes an external command.
#[derive(Debug, Clone)]
pub struct CommandTask {
    /// Task name (used for identification)
    name: String,
    /// Program to execute
    program: String,
    /// Command arguments
    args: Vec<String>,
    /// Environment variables
    environment: BTreeMap<String, String>,
    /// Working directory
    working_dir: Option<PathBuf>,
}

impl CommandTask {
    /// Create a new builder for a command task.
    pub fn builder(program: impl Into<String>) -> CommandTaskBuilder {
        CommandTaskBuilder::new(program)
    }

    /// Get the program being executed.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the command arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Get the environment variables set for the command.
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Get the working directory.
    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }
}

#[async_trait]
impl Task for CommandTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(&self.environment);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = cmd.output().await.map_err(|e| {
            TaskError::ExecutionFailed(format!("failed to spawn '{}': {}", self.program, e))
        })?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            for line in stdout.trim().lines() {
                tracing::debug!(task = %self.name, "stdout: {}", line);
            }
            Ok(())
        } else {
            Err(TaskError::CommandFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Builder for creating `CommandTask` instances.
#[derive(Debug, Clone)]
pub struct CommandTaskBuilder {
    name: Option<String>,
    program: String,
    args: Vec<String>,
    environment: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl CommandTaskBuilder {
    /// Create a new builder with the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            name: None,
            program: program.into(),
            args: Vec::new(),
            environment: BTreeMap::new(),
            working_dir: None,
        }
    }

    /// Set the task name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a single environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Add several environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Build the `CommandTask`.
    pub fn build(self) -> CommandTask {
        let name = self.name.unwrap_or_else(|| self.program.clone());
        CommandTask {
            name,
            program: self.program,
            args: self.args,
            environment: self.environment,
            working_dir: self.working_dir,
        }
    }
}
