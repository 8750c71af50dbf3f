//! Sequential composition of tasks.

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::task::{Task, TaskError, TaskRef};

/// Runs its steps one after another, stopping at the first failure.
#[derive(Clone)]
pub struct Sequence {
    name: String,
    steps: Vec<TaskRef>,
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let steps: Vec<&str> = self.steps.iter().map(|s| s.name()).collect();
        f.debug_struct("Sequence")
            .field("name", &self.name)
            .field("steps", &steps)
            .finish()
    }
}

impl Sequence {
    /// An empty sequence, which succeeds trivially.
    pub fn new() -> Self {
        Self {
            name: "sequence".to_string(),
            steps: Vec::new(),
        }
    }

    /// Rename the sequence (used in logs).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a step.
    pub fn then(mut self, step: TaskRef) -> Self {
        self.steps.push(step);
        self
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the sequence has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Erase into a [`TaskRef`].
    pub fn into_ref(self) -> TaskRef {
        Arc::new(self)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Compose `steps` into a single task that runs them strictly in order.
pub fn sequence(steps: impl IntoIterator<Item = TaskRef>) -> Sequence {
    steps.into_iter().fold(Sequence::new(), Sequence::then)
}

#[async_trait]
impl Task for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), TaskError> {
        for (index, step) in self.steps.iter().enumerate() {
            if let Err(e) = step.run().await {
                tracing::debug!(
                    sequence = %self.name,
                    step = %step.name(),
                    index,
                    error = %e,
                    "Sequence step failed, skipping remaining steps"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}
