use std::fs;
use std::path::Path;

use log::{info, warn};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::job::target::{DependencyPolicy, Target};
use crate::scheduler::Directives;

/// Everything needed to submit a batch of independent tasks
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub target: Target,
    /// One entry per task, each the positional arguments of one call
    pub arguments: Vec<Vec<Value>>,
    /// Added after the configured directives
    pub directives: Directives,
    pub dependencies: DependencyPolicy,
    /// Overrides the configured working directory
    pub working_dir: Option<String>,
}

impl JobRequest {
    pub fn new(target: Target, arguments: Vec<Vec<Value>>) -> Self {
        JobRequest {
            target,
            arguments,
            directives: Directives::default(),
            dependencies: DependencyPolicy::default(),
            working_dir: None,
        }
    }
}

/// Read a task list: a JSON array with one array of positional arguments per task
pub fn read_arguments(path: &Path) -> Result<Vec<Vec<Value>>> {
    info!("Reading task arguments at {}", path.display());
    let json = fs::read_to_string(path).map_err(|err| {
        warn!("Can't read task arguments at path {}: {}", path.display(), err);
        err
    })?;
    let value: Value = serde_json::from_str(&json)?;
    match value {
        Value::Array(tasks) => tasks
            .into_iter()
            .enumerate()
            .map(|(i, task)| match task {
                Value::Array(args) => Ok(args),
                other => Err(Error::Config(format!("task {} arguments must be an array, got {}", i + 1, other))),
            })
            .collect(),
        _ => Err(Error::Config(format!("{} must hold an array of tasks", path.display()))),
    }
}
