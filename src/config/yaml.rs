//! YAML configuration parsing.
//!
//! Parses job definitions from YAML files:
//!
//! ```yaml
//! name: nightly-backup
//! interval: 1h
//! defer: 30s
//! timeout: 10m
//! on_error: log
//! steps:
//!   - command: pg_dump
//!     args: ["-f", "/backups/db.sql"]
//!   - command: gzip
//!     args: ["/backups/db.sql"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::job::JobError;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML.
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A duration string could not be parsed or was zero.
    #[error("invalid duration: '{0}'")]
    InvalidDuration(String),

    /// The job descriptor was rejected.
    #[error(transparent)]
    Job(#[from] JobError),
}

/// Job configuration from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name, unique among loaded jobs.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Time between starts, e.g. `30s`.
    pub interval: String,
    /// Wait before the first execution.
    pub defer: Option<String>,
    /// Upper bound for one execution.
    pub timeout: Option<String>,
    /// Commands run in order on every tick.
    pub steps: Vec<StepConfig>,
    /// What a failed execution does to the cycle.
    #[serde(default)]
    pub on_error: ErrorPolicy,
    /// Whether the job is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl JobConfig {
    /// Parsed interval.
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.interval)
    }

    /// Parsed defer, if set.
    pub fn defer(&self) -> Result<Option<Duration>, ConfigError> {
        self.defer.as_deref().map(parse_duration).transpose()
    }

    /// Parsed timeout, if set.
    pub fn timeout(&self) -> Result<Option<Duration>, ConfigError> {
        self.timeout.as_deref().map(parse_duration).transpose()
    }
}

/// One command of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Name used in logs; defaults to `<job>[<index>]`.
    pub name: Option<String>,
    /// The command to run.
    pub command: String,
    /// Command arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// Environment variables for this step.
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

/// Failure policy for a configured job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// A failed execution cancels the whole cycle.
    #[default]
    Fail,
    /// A failed execution is logged and the job keeps its schedule.
    Log,
}

/// Parse a duration such as `500ms`, `30s`, `5m`, `1h30m` or `1d`.
///
/// A bare integer is read as milliseconds. Zero is rejected.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(input.to_string());
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid());
    }

    let total = if let Ok(ms) = s.parse::<u64>() {
        Duration::from_millis(ms)
    } else {
        let mut total = Duration::ZERO;
        let mut rest = s;
        while !rest.is_empty() {
            let digits = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            if digits == 0 {
                return Err(invalid());
            }
            let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
            rest = &rest[digits..];

            let unit_len = rest
                .find(|c: char| c.is_ascii_digit())
                .unwrap_or(rest.len());
            let seconds_per_unit = match &rest[..unit_len] {
                "ms" => None,
                "s" => Some(1),
                "m" => Some(60),
                "h" => Some(60 * 60),
                "d" => Some(24 * 60 * 60),
                _ => return Err(invalid()),
            };
            rest = &rest[unit_len..];

            let step = match seconds_per_unit {
                None => Duration::from_millis(value),
                Some(factor) => Duration::from_secs(value.checked_mul(factor).ok_or_else(invalid)?),
            };
            total = total.checked_add(step).ok_or_else(invalid)?;
        }
        total
    };

    if total.is_zero() {
        return Err(invalid());
    }
    Ok(total)
}

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load a job configuration from a file.
    pub fn load_job_config(path: impl AsRef<Path>) -> Result<JobConfig, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_job_config(&content)
    }

    /// Parse a job configuration from a YAML string.
    pub fn parse_job_config(yaml: &str) -> Result<JobConfig, ConfigError> {
        let config: JobConfig = serde_yaml::from_str(yaml)?;
        Self::validate_job_config(&config)?;
        Ok(config)
    }

    /// Validate a job configuration.
    fn validate_job_config(config: &JobConfig) -> Result<(), ConfigError> {
        if config.name.trim().is_empty() {
            return Err(ConfigError::MissingField("name".into()));
        }

        if config.steps.is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "job '{}' must have at least one step",
                config.name
            )));
        }

        if let Some(step) = config.steps.iter().find(|s| s.command.trim().is_empty()) {
            return Err(ConfigError::MissingField(format!(
                "command (step {})",
                step.name.as_deref().unwrap_or("unnamed")
            )));
        }

        config.interval()?;
        config.defer()?;
        config.timeout()?;

        Ok(())
    }
}
