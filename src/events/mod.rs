//! Lifecycle events and event handling.
//!
//! This module provides event emission for cycle and job lifecycle events,
//! enabling observability into a running cycle without touching job bodies.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::core::types::{CycleId, JobId};

/// Lifecycle events emitted by a cycle.
#[derive(Debug, Clone)]
pub enum Event {
    /// A cycle has started scheduling its jobs.
    CycleStarted {
        cycle_id: CycleId,
        job_count: usize,
        timestamp: Instant,
    },

    /// A job's timer setup is being delayed by its defer.
    JobDeferred {
        cycle_id: CycleId,
        job_id: JobId,
        defer: Duration,
        timestamp: Instant,
    },

    /// A job's repeating timer has been armed.
    JobScheduled {
        cycle_id: CycleId,
        job_id: JobId,
        interval: Duration,
        timestamp: Instant,
    },

    /// A job's timer fired and an execution was started.
    ///
    /// `tick` counts from 1 for each job.
    JobTicked {
        cycle_id: CycleId,
        job_id: JobId,
        tick: u64,
        timestamp: Instant,
    },

    /// A tick's execution completed without an unhandled error.
    JobCompleted {
        cycle_id: CycleId,
        job_id: JobId,
        tick: u64,
        duration: Duration,
        timestamp: Instant,
    },

    /// A tick's execution failed with an unhandled error.
    JobFailed {
        cycle_id: CycleId,
        job_id: JobId,
        tick: u64,
        error: String,
        timestamp: Instant,
    },

    /// The cycle was cancelled because a job failed.
    CycleCancelled {
        cycle_id: CycleId,
        job_id: JobId,
        error: String,
        timestamp: Instant,
    },

    /// The cycle was stopped from outside.
    CycleStopped {
        cycle_id: CycleId,
        timestamp: Instant,
    },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::CycleStarted { timestamp, .. } => *timestamp,
            Event::JobDeferred { timestamp, .. } => *timestamp,
            Event::JobScheduled { timestamp, .. } => *timestamp,
            Event::JobTicked { timestamp, .. } => *timestamp,
            Event::JobCompleted { timestamp, .. } => *timestamp,
            Event::JobFailed { timestamp, .. } => *timestamp,
            Event::CycleCancelled { timestamp, .. } => *timestamp,
            Event::CycleStopped { timestamp, .. } => *timestamp,
        }
    }

    /// Get the cycle the event belongs to.
    pub fn cycle_id(&self) -> CycleId {
        match self {
            Event::CycleStarted { cycle_id, .. }
            | Event::JobDeferred { cycle_id, .. }
            | Event::JobScheduled { cycle_id, .. }
            | Event::JobTicked { cycle_id, .. }
            | Event::JobCompleted { cycle_id, .. }
            | Event::JobFailed { cycle_id, .. }
            | Event::CycleCancelled { cycle_id, .. }
            | Event::CycleStopped { cycle_id, .. } => *cycle_id,
        }
    }

    /// Get the job the event concerns, if any.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Event::JobDeferred { job_id, .. }
            | Event::JobScheduled { job_id, .. }
            | Event::JobTicked { job_id, .. }
            | Event::JobCompleted { job_id, .. }
            | Event::JobFailed { job_id, .. }
            | Event::CycleCancelled { job_id, .. } => Some(job_id),
            Event::CycleStarted { .. } | Event::CycleStopped { .. } => None,
        }
    }

    /// Create a CycleStarted event.
    pub fn cycle_started(cycle_id: CycleId, job_count: usize) -> Self {
        Event::CycleStarted {
            cycle_id,
            job_count,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobDeferred event.
    pub fn job_deferred(cycle_id: CycleId, job_id: JobId, defer: Duration) -> Self {
        Event::JobDeferred {
            cycle_id,
            job_id,
            defer,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobScheduled event.
    pub fn job_scheduled(cycle_id: CycleId, job_id: JobId, interval: Duration) -> Self {
        Event::JobScheduled {
            cycle_id,
            job_id,
            interval,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobTicked event.
    pub fn job_ticked(cycle_id: CycleId, job_id: JobId, tick: u64) -> Self {
        Event::JobTicked {
            cycle_id,
            job_id,
            tick,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobCompleted event.
    pub fn job_completed(cycle_id: CycleId, job_id: JobId, tick: u64, duration: Duration) -> Self {
        Event::JobCompleted {
            cycle_id,
            job_id,
            tick,
            duration,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobFailed event.
    pub fn job_failed(cycle_id: CycleId, job_id: JobId, tick: u64, error: String) -> Self {
        Event::JobFailed {
            cycle_id,
            job_id,
            tick,
            error,
            timestamp: Instant::now(),
        }
    }

    /// Create a CycleCancelled event.
    pub fn cycle_cancelled(cycle_id: CycleId, job_id: JobId, error: String) -> Self {
        Event::CycleCancelled {
            cycle_id,
            job_id,
            error,
            timestamp: Instant::now(),
        }
    }

    /// Create a CycleStopped event.
    pub fn cycle_stopped(cycle_id: CycleId) -> Self {
        Event::CycleStopped {
            cycle_id,
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers, in registration order.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}
