//! Cycle engine implementation.
//!
//! A cycle is responsible for:
//! - Arming one repeating timer per job, after the job's defer if it has one
//! - Starting a detached execution of the job's task on every tick
//! - Cancelling every timer on the first unhandled failure
//! - Event emission
//!
//! The cycle calls each job's task directly. Overlap rejection and timeouts
//! are only applied to jobs whose task was wrapped with
//! [`prepare`](crate::prepare) beforehand.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::core::job::Job;
use crate::core::task::{TaskError, TaskRef};
use crate::core::types::{CycleId, JobId};
use crate::events::{Event, EventBus};
use crate::execution::join_error;

use super::handle::CycleHandle;
use super::types::{CycleError, CycleState};

/// The failure that cancels a cycle.
struct Failure {
    job_id: JobId,
    tick: u64,
    error: TaskError,
}

/// A group of jobs driven concurrently on independent timers.
pub struct Cycle {
    /// Identifier used in events and logs.
    id: CycleId,
    /// Working copies of the registered jobs, in registration order.
    jobs: Vec<Job>,
    /// Event bus for emitting events.
    event_bus: Arc<EventBus>,
}

impl Cycle {
    /// Create an empty cycle.
    pub fn new() -> Self {
        Self {
            id: CycleId::new(),
            jobs: Vec::new(),
            event_bus: Arc::new(EventBus::new()),
        }
    }

    /// Set the event bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Arc::new(event_bus);
        self
    }

    /// Set a shared event bus.
    pub fn with_shared_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Register a job with the cycle.
    ///
    /// The cycle keeps its own copy of the job with status `Pending`. Names
    /// need not be unique; every registered job gets its own timer.
    pub fn register(&mut self, job: Job) {
        self.jobs.push(job.working_copy());
    }

    /// Register a job, builder style.
    pub fn with_job(mut self, job: Job) -> Self {
        self.register(job);
        self
    }

    /// Get the cycle identifier.
    pub fn id(&self) -> CycleId {
        self.id
    }

    /// Get the first registered job with this ID.
    pub fn get_job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| &job.id() == id)
    }

    /// List all registered jobs in registration order.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Get the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Run until a job fails.
    ///
    /// Never returns successfully. The error names the job whose unhandled
    /// failure cancelled the cycle.
    pub async fn run(self) -> Result<Infallible, CycleError> {
        self.drive(std::future::pending::<Infallible>()).await
    }

    /// Run until `shutdown` completes or a job fails.
    ///
    /// When `shutdown` wins, every timer is stopped and `Ok(())` is returned.
    /// Ticks already in flight are not awaited.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), CycleError>
    where
        F: Future<Output = ()>,
    {
        self.drive(shutdown).await
    }

    /// Spawn the cycle and return a handle for stopping it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> (CycleHandle, JoinHandle<Result<(), CycleError>>) {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let state = Arc::new(RwLock::new(CycleState::Running));

        let handle = CycleHandle {
            stop_tx: Arc::new(stop_tx),
            state: Arc::clone(&state),
        };

        let cycle_task = tokio::spawn(async move {
            let shutdown = async move {
                // All handles gone: keep running.
                if stop_rx.wait_for(|stop| *stop).await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            let result = self.run_until(shutdown).await;
            *state.write().await = match result {
                Ok(()) => CycleState::Stopped,
                Err(_) => CycleState::Failed,
            };
            result
        });

        (handle, cycle_task)
    }

    /// Main cycle loop.
    async fn drive<T>(self, shutdown: impl Future<Output = T>) -> Result<T, CycleError> {
        if self.jobs.is_empty() {
            return Err(CycleError::NoJobs);
        }

        let Cycle {
            id,
            jobs,
            event_bus,
        } = self;

        tracing::info!(cycle_id = %id, jobs = jobs.len(), "Cycle started");
        event_bus.emit(Event::cycle_started(id, jobs.len())).await;

        let stopped = Arc::new(AtomicBool::new(false));
        let (failure_tx, mut failure_rx) = mpsc::unbounded_channel::<Failure>();

        let mut timers = JoinSet::new();
        for job in jobs {
            let ticker = Arc::new(Ticker {
                cycle_id: id,
                job_id: job.id(),
                task: Arc::clone(job.task()),
                stopped: Arc::clone(&stopped),
                failures: failure_tx.clone(),
                event_bus: Arc::clone(&event_bus),
            });
            timers.spawn(drive_job(ticker, job.interval(), job.defer()));
        }

        let outcome = tokio::select! {
            biased;
            Some(failure) = failure_rx.recv() => Err(failure),
            value = shutdown => Ok(value),
        };

        stopped.store(true, Ordering::SeqCst);
        timers.shutdown().await;
        drop(failure_tx);

        match outcome {
            Ok(value) => {
                tracing::info!(cycle_id = %id, "Cycle stopped");
                event_bus.emit(Event::cycle_stopped(id)).await;
                Ok(value)
            }
            Err(Failure {
                job_id: job,
                tick,
                error: source,
            }) => {
                tracing::error!(cycle_id = %id, job = %job, error = %source, "Job failed, cancelling cycle");
                event_bus
                    .emit(Event::job_failed(id, job.clone(), tick, source.to_string()))
                    .await;
                event_bus
                    .emit(Event::cycle_cancelled(id, job.clone(), source.to_string()))
                    .await;
                Err(CycleError::JobFailed { job, source })
            }
        }
    }
}

impl Default for Cycle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.jobs.iter().map(Job::name).collect();
        f.debug_struct("Cycle")
            .field("id", &self.id)
            .field("jobs", &names)
            .finish()
    }
}

/// Run `jobs` as a single cycle until one of them fails.
///
/// Shorthand for registering every job with a fresh [`Cycle`] and calling
/// [`Cycle::run`].
pub async fn run(jobs: impl IntoIterator<Item = Job>) -> Result<Infallible, CycleError> {
    jobs.into_iter()
        .fold(Cycle::new(), Cycle::with_job)
        .run()
        .await
}

/// Everything a job's ticks need, shared between them.
struct Ticker {
    cycle_id: CycleId,
    job_id: JobId,
    task: TaskRef,
    stopped: Arc<AtomicBool>,
    failures: mpsc::UnboundedSender<Failure>,
    event_bus: Arc<EventBus>,
}

impl Ticker {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Timer loop for one job. Runs until aborted by the cycle.
async fn drive_job(ticker: Arc<Ticker>, period: Duration, defer: Option<Duration>) {
    if let Some(defer) = defer {
        tracing::debug!(job = %ticker.job_id, ?defer, "Deferring job timer");
        ticker
            .event_bus
            .emit(Event::job_deferred(ticker.cycle_id, ticker.job_id.clone(), defer))
            .await;
        tokio::time::sleep(defer).await;
    }

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
        .event_bus
        .emit(Event::job_scheduled(ticker.cycle_id, ticker.job_id.clone(), period))
        .await;

    let mut tick: u64 = 0;
    loop {
        interval.tick().await;
        if ticker.is_stopped() {
            break;
        }
        tick += 1;
        tokio::spawn(run_tick(Arc::clone(&ticker), tick));
    }
}

/// One execution of a job's task. Results arriving after cancellation are dropped.
///
/// `JobFailed` is emitted by the cycle loop once the timers are down.
async fn run_tick(ticker: Arc<Ticker>, tick: u64) {
    if ticker.is_stopped() {
        return;
    }
    tracing::debug!(job = %ticker.job_id, tick, "Job tick");
    ticker
        .event_bus
        .emit(Event::job_ticked(ticker.cycle_id, ticker.job_id.clone(), tick))
        .await;

    let start = Instant::now();
    let task = Arc::clone(&ticker.task);
    let result = tokio::spawn(async move { task.run().await })
        .await
        .unwrap_or_else(|e| Err(join_error(e)));

    if ticker.is_stopped() {
        return;
    }

    match result {
        Ok(()) => {
            tracing::debug!(job = %ticker.job_id, tick, duration = ?start.elapsed(), "Job tick completed");
            ticker
                .event_bus
                .emit(Event::job_completed(
                    ticker.cycle_id,
                    ticker.job_id.clone(),
                    tick,
                    start.elapsed(),
                ))
                .await;
        }
        Err(error) => {
            // Only the first failure stops the timers and gets reported.
            if ticker.stopped.swap(true, Ordering::SeqCst) {
                return;
            }
            let _ = ticker.failures.send(Failure {
                job_id: ticker.job_id.clone(),
                tick,
                error,
            });
        }
    }
}
