//! Core types: jobs, tasks, statuses and identifiers.

pub mod job;
pub mod status;
pub mod task;
pub mod types;
