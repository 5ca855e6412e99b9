//! Submit a batch of independent tasks as one job and look after its remote workspace
//!
//! A `Job` owns its workspace and its transport session. Submission is all-or-nothing: either the
//! scheduler accepted every task and a `Job` comes back, or an error carrying the raw scheduler
//! output does. When a `Job` goes out of scope without being closed or kept, its workspace is
//! removed if every task is done and left alone (with a warning) otherwise.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::credentials::{authenticated, CredentialProvider};
use crate::error::{Error, Result};
use crate::remote_io;
use crate::request::JobRequest;
use crate::scheduler::{query_states, Scheduler, TaskSubmission};
use crate::shell;
use crate::state::{CanonicalState, JobStatus};
use crate::transport::{self, CommandOutput, Transport};

use self::invocation::{Invocation, ARGUMENTS_FILE};
use self::task::{argument_field, log_file, Task};
use self::workspace::Workspace;

/// Render the per-task remote command line
pub mod invocation;

/// The function tasks run and the files staged with it
pub mod target;

/// Submitted tasks and the names of their artifacts
pub mod task;

/// Allocation and guarded removal of job workspaces
pub mod workspace;

/// Script of `qsub` calls, one line per task
static COMMAND_FILE: &str = "command.sh";

/// A session with one cluster: how to reach it and which scheduler it runs
pub struct Cluster {
    pub transport: Box<dyn Transport>,
    pub scheduler: Box<dyn Scheduler>,
}

/// What happened to the workspace when a job was closed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposal {
    Removed,
    /// Some tasks weren't done, so the workspace was kept
    Retained(JobStatus),
}

/// Contents of `<i>_output.json`
#[derive(Deserialize, Serialize)]
struct OutputRecord {
    output: Vec<Value>,
}

pub struct Job {
    cluster: Cluster,
    workspace: Workspace,
    tasks: Vec<Task>,
    submitted_at: DateTime<Utc>,
    /// Set once the workspace has been removed, kept, or the close-time check has run
    settled: bool,
}

impl JobRequest {
    /// Stage the target and arguments in a fresh workspace and submit every task in one round trip
    pub fn submit(self, mut cluster: Cluster, credentials: &mut dyn CredentialProvider, config: &Config) -> Result<Job> {
        let n = self.arguments.len();
        if n == 0 {
            return Err(Error::NoTasks);
        }

        let (paths, names) = self.target.staged_files(self.dependencies)?;

        let working_dir = self.working_dir.as_deref().or(config.working_dir.as_deref());
        let allocated = Workspace::allocate(working_dir);
        let mkdir = allocated.create_command();
        let lines = authenticated(cluster.transport.as_mut(), credentials, config.auth_attempts, |t| transport::run(t, &mkdir))?;
        let workspace = allocated.resolved(lines.last().map(String::as_str).unwrap_or_default())?;
        info!("Created job workspace {}", workspace.path());

        info!("Staging {} file(s) for {}", paths.len(), self.target.function);
        cluster.transport.put_files(&paths, workspace.path(), &names)?;

        let arguments: Map<String, Value> = self
            .arguments
            .iter()
            .enumerate()
            .map(|(i, args)| (argument_field(i + 1), Value::Array(args.clone())))
            .collect();
        remote_io::write_structured(cluster.transport.as_mut(), workspace.path(), ARGUMENTS_FILE, &arguments)?;

        let template = config.invocation_template()?;
        let invocation = Invocation::new(&template, &config.runtime)?;
        let directives = config.directives.merged(&self.directives);
        let commands = (1..=n)
            .map(|index| {
                let invocation = invocation.render(workspace.path(), &self.target, index)?;
                let job_name = format!("{}{}", config.job_name, index);
                let log_path = workspace.file(&log_file(index));
                Ok(cluster.scheduler.build_submit_command(&TaskSubmission {
                    index,
                    job_name: &job_name,
                    invocation: &invocation,
                    directives: &directives,
                    log_path: &log_path,
                }))
            })
            .collect::<Result<Vec<String>>>()?;
        remote_io::write_text(cluster.transport.as_mut(), workspace.path(), COMMAND_FILE, &(commands.join("\n") + "\n"))?;

        info!("Submitting {} task(s) to {}", n, cluster.scheduler.name());
        let script = format!("sh {}", shell::quote(&workspace.file(COMMAND_FILE)));
        let output = cluster.transport.execute(&script)?;
        let job_ids = cluster
            .scheduler
            .parse_submit_response(&output.lines, n)
            .and_then(|ids| accepted(ids, &output))
            .map_err(|err| {
                error!("Submission to {} failed, leaving {} for inspection", cluster.scheduler.name(), workspace.path());
                err
            })?;

        let tasks = self
            .arguments
            .into_iter()
            .zip(job_ids)
            .enumerate()
            .map(|(i, (args, id))| Task::new(i + 1, id, args, self.target.produces_output))
            .collect::<Vec<Task>>();
        info!(
            "Submitted {} task(s): {}",
            tasks.len(),
            tasks.iter().map(|t| t.job_id()).collect::<Vec<_>>().join(" ")
        );

        Ok(Job { cluster, workspace, tasks, submitted_at: Utc::now(), settled: false })
    }
}

/// The script must have exited cleanly and the scheduler must have handed out distinct ids
fn accepted(ids: Vec<String>, output: &CommandOutput) -> Result<Vec<String>> {
    if !output.success() {
        return Err(Error::Submission {
            reason: format!("submission script exited with status {}", output.status),
            output: output.lines.clone(),
        });
    }
    let distinct: HashSet<&String> = ids.iter().collect();
    match distinct.len() == ids.len() {
        true => Ok(ids),
        false => Err(Error::Submission {
            reason: "scheduler returned duplicate job ids".to_string(),
            output: output.lines.clone(),
        }),
    }
}

impl Job {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.job_id().to_string()).collect()
    }

    /// Current state of each task, in task order, from a fresh scheduler query
    pub fn task_states(&mut self) -> Result<Vec<CanonicalState>> {
        let ids = self.job_ids();
        query_states(self.cluster.scheduler.as_ref(), self.cluster.transport.as_mut(), &ids)
    }

    /// Distinct states across all tasks. Never cached: every call asks the scheduler.
    pub fn status(&mut self) -> Result<JobStatus> {
        Ok(self.task_states()?.into_iter().collect())
    }

    /// Ask the scheduler to delete every task. Doesn't wait for it to happen.
    pub fn kill(&mut self) -> Result<()> {
        let command = self.cluster.scheduler.build_kill_command(&self.job_ids());
        info!("Killing {} task(s) in {}", self.tasks.len(), self.workspace.path());
        let output = self.cluster.transport.execute(&command)?;
        if !output.success() {
            warn!("{} exited with {}: {}", command, output.status, output.lines.join(" "));
        }
        Ok(())
    }

    /// Remove the workspace and everything in it
    pub fn cleanup(&mut self) -> Result<()> {
        let command = self.workspace.removal_command()?;
        info!("Removing job workspace {}", self.workspace.path());
        transport::run(self.cluster.transport.as_mut(), &command)?;
        self.settled = true;
        Ok(())
    }

    /// Remove the workspace if every task is done, otherwise keep it and say why
    pub fn close(mut self) -> Result<Disposal> {
        self.settle()
    }

    /// Give up ownership of the workspace without touching it
    pub fn keep(mut self) -> Workspace {
        self.settled = true;
        info!("Keeping job workspace {}", self.workspace.path());
        self.workspace.clone()
    }

    fn settle(&mut self) -> Result<Disposal> {
        self.settled = true;
        let status = self.status()?;
        match status.is_done() {
            true => {
                self.cleanup()?;
                Ok(Disposal::Removed)
            }
            false => {
                warn!(
                    "Job in {} is still {}, not removing its workspace",
                    self.workspace.path(),
                    status
                );
                Ok(Disposal::Retained(status))
            }
        }
    }

    fn task(&self, index: usize) -> Result<&Task> {
        self.tasks
            .iter()
            .find(|t| t.index() == index)
            .ok_or(Error::NoSuchTask(index))
    }

    /// Return values of task `index` (1-based), `None` when the target returns nothing
    pub fn read_output(&mut self, index: usize) -> Result<Option<Vec<Value>>> {
        let name = match self.task(index)?.output_file() {
            Some(name) => name.to_string(),
            None => return Ok(None),
        };
        let record: OutputRecord = self.read_structured(&name)?;
        Ok(Some(record.output))
    }

    /// Everything task `index` (1-based) logged while running
    pub fn read_diary(&mut self, index: usize) -> Result<String> {
        let name = self.task(index)?.diary_file().to_string();
        self.read_text(&name)
    }

    pub fn write_text(&mut self, name: &str, content: &str) -> Result<()> {
        remote_io::write_text(self.cluster.transport.as_mut(), self.workspace.path(), name, content)
    }

    pub fn write_structured<T: Serialize>(&mut self, name: &str, record: &T) -> Result<()> {
        remote_io::write_structured(self.cluster.transport.as_mut(), self.workspace.path(), name, record)
    }

    pub fn read_text(&mut self, name: &str) -> Result<String> {
        remote_io::read_text(self.cluster.transport.as_mut(), self.workspace.path(), name)
    }

    pub fn read_structured<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        remote_io::read_structured(self.cluster.transport.as_mut(), self.workspace.path(), name)
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(err) = self.settle() {
            warn!("Couldn't settle job workspace {}: {}", self.workspace.path(), err);
        }
    }
}

#[cfg(test)]
impl Job {
    fn from_parts(cluster: Cluster, workspace: Workspace, tasks: Vec<Task>) -> Job {
        Job { cluster, workspace, tasks, submitted_at: Utc::now(), settled: false }
    }
}
