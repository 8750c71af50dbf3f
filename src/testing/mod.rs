//! Testing utilities for users of the Cadence library.
//!
//! This module provides helpers for testing jobs and cycles:
//!
//! - [`CountingTask`]: Counts executions, optionally failing on a given call
//! - [`FailingTask`]: Fails N times then succeeds
//! - [`SlowTask`]: Sleeps before succeeding
//! - [`PendingTask`]: Never completes
//! - [`RecordingHooks`]: Builds [`Hooks`] that record every callback
//! - [`RecordingHandler`]: An event handler that keeps every event
//!
//! The tasks are meant to be shared: keep an `Arc` for assertions and hand a
//! clone to the job.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cadence::Job;
//! use cadence::testing::CountingTask;
//!
//! let task = Arc::new(CountingTask::new("tick"));
//! let job = Job::new("tick", Duration::from_secs(1), task.clone());
//! assert_eq!(task.count(), 0);
//! ```

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::core::job::JobInfo;
use crate::core::task::{Task, TaskError};
use crate::events::{Event, EventHandler};
use crate::execution::Hooks;

/// A task that counts how often it ran.
///
/// With [`failing_on`](Self::failing_on), the n-th call (1-indexed) fails.
pub struct CountingTask {
    name: String,
    calls: AtomicU32,
    fail_on: Option<u32>,
}

impl CountingTask {
    /// Create a task that always succeeds.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicU32::new(0),
            fail_on: None,
        }
    }

    /// Fail on the `call`-th execution.
    pub fn failing_on(mut self, call: u32) -> Self {
        self.fail_on = Some(call);
        self
    }

    /// Number of executions so far.
    pub fn count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for CountingTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(call) {
            return Err(TaskError::ExecutionFailed(format!(
                "{} failed on call {}",
                self.name, call
            )));
        }
        Ok(())
    }
}

/// A task that fails a configurable number of times before succeeding.
///
/// Safe for concurrent execution: the check-and-decrement is a single lock.
///
/// ```
/// use cadence::testing::FailingTask;
///
/// // Fails 2 times, then succeeds on the 3rd attempt
/// let task = FailingTask::new("flaky_task", 2);
/// ```
pub struct FailingTask {
    name: String,
    state: Mutex<FailingTaskState>,
    error_message: String,
}

struct FailingTaskState {
    failures_remaining: u32,
    call_count: u32,
}

impl FailingTask {
    /// Create a task that fails `fail_count` times then succeeds.
    pub fn new(name: impl Into<String>, fail_count: u32) -> Self {
        Self::with_error(name, fail_count, "intentional test failure")
    }

    /// Create a task that never succeeds.
    pub fn always(name: impl Into<String>) -> Self {
        Self::new(name, u32::MAX)
    }

    /// Create a task that fails with a custom error message.
    pub fn with_error(
        name: impl Into<String>,
        fail_count: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(FailingTaskState {
                failures_remaining: fail_count,
                call_count: 0,
            }),
            error_message: message.into(),
        }
    }

    /// Get the number of failures remaining before success.
    pub fn failures_remaining(&self) -> u32 {
        self.lock().failures_remaining
    }

    /// Get the number of times this task has been called.
    pub fn call_count(&self) -> u32 {
        self.lock().call_count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FailingTaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Task for FailingTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        let mut state = self.lock();
        state.call_count += 1;

        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            Err(TaskError::ExecutionFailed(self.error_message.clone()))
        } else {
            Ok(())
        }
    }
}

/// A task that sleeps for a fixed delay, then succeeds.
pub struct SlowTask {
    name: String,
    delay: Duration,
    started: AtomicU32,
    finished: AtomicU32,
}

impl SlowTask {
    /// Create a task that takes `delay` to complete.
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
            started: AtomicU32::new(0),
            finished: AtomicU32::new(0),
        }
    }

    /// Executions that have begun.
    pub fn started(&self) -> u32 {
        self.started.load(Ordering::SeqCst)
    }

    /// Executions that ran to completion.
    pub fn finished(&self) -> u32 {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for SlowTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A task that never completes.
pub struct PendingTask {
    name: String,
    calls: AtomicU32,
}

impl PendingTask {
    /// Create a task whose executions never resolve.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of executions started.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for PendingTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// One recorded lifecycle callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCall {
    /// `before` ran with this snapshot.
    Before(JobInfo),
    /// `after` ran with this snapshot.
    After(JobInfo),
    /// `on_error` ran with this snapshot and the error's message.
    Error(JobInfo, String),
}

/// Records every hook invocation of the [`Hooks`] it builds.
#[derive(Clone, Default)]
pub struct RecordingHooks {
    calls: Arc<Mutex<Vec<HookCall>>>,
}

impl RecordingHooks {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// `before` and `after` hooks only; failures stay hard.
    pub fn hooks(&self) -> Hooks {
        let before = Arc::clone(&self.calls);
        let after = Arc::clone(&self.calls);
        Hooks::new()
            .before(move |info| push(&before, HookCall::Before(info.clone())))
            .after(move |info| push(&after, HookCall::After(info.clone())))
    }

    /// All hooks, including an error handler that absorbs every failure.
    pub fn hooks_with_handler(&self) -> Hooks {
        let errors = Arc::clone(&self.calls);
        self.hooks().on_error(move |info, err| {
            push(&errors, HookCall::Error(info.clone(), err.to_string()));
            Ok(())
        })
    }

    /// Everything recorded so far, in order.
    pub fn calls(&self) -> Vec<HookCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages passed to the error handler, in order.
    pub fn errors(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HookCall::Error(_, message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

fn push(calls: &Mutex<Vec<HookCall>>, call: HookCall) {
    calls
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(call);
}

/// Event handler that keeps every event it receives.
#[derive(Default)]
pub struct RecordingHandler {
    events: tokio::sync::Mutex<Vec<Event>>,
}

impl RecordingHandler {
    /// Create a shareable recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything recorded so far, in order.
    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }

    /// Number of recorded events matching `predicate`.
    pub async fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().await.iter().filter(|e| predicate(e)).count()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}
