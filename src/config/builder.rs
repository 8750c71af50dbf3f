//! Job builder from YAML configuration.
//!
//! This module converts a `JobConfig` into a job ready for a cycle: the steps
//! become command tasks, several steps run as a sequence, and the result is
//! supervised so overlaps and timeouts are enforced on every tick.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::job::Job;
use crate::core::task::TaskRef;
use crate::execution::{CommandTask, Hooks, Sequence, prepare};

use super::yaml::{ConfigError, ErrorPolicy, JobConfig, StepConfig, YamlLoader};

/// Builder for creating Jobs from YAML configuration.
pub struct JobConfigBuilder;

impl JobConfigBuilder {
    /// Build a Job from a JobConfig.
    ///
    /// The returned job's task is the supervised runnable; its status is
    /// tracked by the supervisor, not by the returned descriptor.
    pub fn build(config: JobConfig) -> Result<Job, ConfigError> {
        let interval = config.interval()?;
        let defer = config.defer()?;
        let timeout = config.timeout()?;

        let mut steps: Vec<TaskRef> = config
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| Self::build_step(&config.name, index, step))
            .collect();

        let body = if steps.len() == 1 {
            steps.remove(0)
        } else {
            steps
                .into_iter()
                .fold(Sequence::new().named(&config.name), Sequence::then)
                .into_ref()
        };

        let mut builder = Job::builder(&config.name).task(body).interval(interval);
        if let Some(defer) = defer {
            builder = builder.defer(defer);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let job = builder.build()?;

        Ok(prepare(job, Self::hooks(config.on_error)).to_job())
    }

    /// Build a command task from a step.
    fn build_step(job_name: &str, index: usize, step: &StepConfig) -> TaskRef {
        let name = step
            .name
            .clone()
            .unwrap_or_else(|| format!("{job_name}[{index}]"));

        let mut builder = CommandTask::builder(&step.command)
            .name(name)
            .args(&step.args)
            .envs(&step.environment);

        if let Some(dir) = &step.working_dir {
            builder = builder.working_dir(dir);
        }

        Arc::new(builder.build())
    }

    /// Logging hooks, plus a logging error handler for `on_error: log`.
    fn hooks(policy: ErrorPolicy) -> Hooks {
        let hooks = Hooks::new()
            .before(|info| tracing::debug!(job = %info.name, "Job starting"))
            .after(|info| tracing::debug!(job = %info.name, "Job finished"));

        match policy {
            ErrorPolicy::Fail => hooks,
            ErrorPolicy::Log => hooks.on_error(|info, err| {
                tracing::warn!(job = %info.name, status = %info.status, error = %err, "Job failed, keeping schedule");
                Ok(())
            }),
        }
    }
}

/// Load all job configurations from a directory.
///
/// Files ending in `.yaml` or `.yml` are read in filename order. Disabled jobs
/// are skipped; two enabled jobs with the same name are an error.
pub fn load_jobs_from_directory(dir: impl AsRef<Path>) -> Result<Vec<Job>, ConfigError> {
    let dir = dir.as_ref();

    if !dir.is_dir() {
        return Err(ConfigError::InvalidConfig(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        // Only process .yaml and .yml files
        if let Some(ext) = path.extension()
            && (ext == "yaml" || ext == "yml")
        {
            paths.push(path);
        }
    }
    paths.sort();

    let mut names = HashSet::new();
    let mut jobs = Vec::new();
    for path in paths {
        let config = YamlLoader::load_job_config(&path)?;
        if !config.enabled {
            tracing::debug!(job = %config.name, path = %path.display(), "Skipping disabled job");
            continue;
        }
        if !names.insert(config.name.clone()) {
            return Err(ConfigError::InvalidConfig(format!(
                "duplicate job name '{}' in '{}'",
                config.name,
                path.display()
            )));
        }
        jobs.push(JobConfigBuilder::build(config)?);
    }

    Ok(jobs)
}
