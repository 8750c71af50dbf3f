//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for jobs.

mod builder;
mod yaml;

pub use builder::{JobConfigBuilder, load_jobs_from_directory};
pub use yaml::{ConfigError, ErrorPolicy, JobConfig, StepConfig, YamlLoader, parse_duration};
