//! Cycle handle for controlling a spawned cycle.
//!
//! This module provides the `CycleHandle` type returned by
//! [`Cycle::start`](super::Cycle::start).

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use super::types::{CycleError, CycleState};

/// Handle for controlling a spawned cycle.
///
/// Dropping every handle leaves the cycle running.
#[derive(Debug, Clone)]
pub struct CycleHandle {
    pub(crate) stop_tx: Arc<watch::Sender<bool>>,
    pub(crate) state: Arc<RwLock<CycleState>>,
}

impl CycleHandle {
    /// Ask the cycle to stop all its timers.
    ///
    /// In-flight ticks are not awaited. Fails if the cycle has already ended.
    pub fn stop(&self) -> Result<(), CycleError> {
        self.stop_tx
            .send(true)
            .map_err(|_| CycleError::ChannelError("cycle is no longer running".to_string()))
    }

    /// Get the current cycle state.
    pub async fn state(&self) -> CycleState {
        *self.state.read().await
    }

    /// Check if the cycle is running.
    pub async fn is_running(&self) -> bool {
        *self.state.read().await == CycleState::Running
    }
}
