//! Scheduler backends: build submission, status and kill commands and parse what comes back
//!
//! All scheduler-specific syntax lives behind the `Scheduler` trait so the job orchestrator never
//! needs to know which queueing system it is talking to.

use std::collections::HashMap;
use std::fmt;

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::CanonicalState;
use crate::transport::Transport;

/// PBS / Torque `qsub`, `qstat -x`, `qdel`
pub mod torque;

/// Sun Grid Engine `qsub`, `qstat -xml`, `qdel`
pub mod sge;

/// Free-form scheduler configuration text, e.g. `-l walltime=01:00:00`
///
/// Directives are opaque: they are written into the submitted script's directive block verbatim,
/// one per line, behind the backend's directive prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DirectiveText")]
pub struct Directives(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum DirectiveText {
    Text(String),
    Lines(Vec<String>),
}

impl From<DirectiveText> for Directives {
    fn from(text: DirectiveText) -> Self {
        match text {
            DirectiveText::Text(s) => Directives::from(s.as_str()),
            DirectiveText::Lines(lines) => Directives::from(lines),
        }
    }
}

impl From<&str> for Directives {
    fn from(text: &str) -> Self {
        Directives(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect())
    }
}

impl From<Vec<String>> for Directives {
    fn from(lines: Vec<String>) -> Self {
        Directives(lines.iter().flat_map(|l| Directives::from(l.as_str()).0).collect())
    }
}

impl Directives {
    pub fn lines(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// These directives followed by `other`'s
    pub fn merged(&self, other: &Directives) -> Directives {
        Directives(self.0.iter().chain(other.0.iter()).cloned().collect())
    }

    /// Prefix each directive with `prefix` unless the caller already wrote it
    fn block(&self, prefix: &str) -> Vec<String> {
        self.0
            .iter()
            .map(|d| match d.starts_with(prefix.trim_end()) {
                true => d.clone(),
                false => format!("{prefix}{d}"),
            })
            .collect()
    }
}

/// Everything a backend needs to wrap one task's invocation into a submission command
#[derive(Debug)]
pub struct TaskSubmission<'a> {
    /// 1-based task index
    pub index: usize,
    pub job_name: &'a str,
    /// Shell command that runs the task on the execution host
    pub invocation: &'a str,
    pub directives: &'a Directives,
    /// Scheduler stdout/stderr file for the task (remote path)
    pub log_path: &'a str,
}

impl TaskSubmission<'_> {
    /// Script piped into `qsub`: directive block, then the invocation
    fn script(&self, directive_prefix: &str) -> Vec<String> {
        let mut lines = self.directives.block(directive_prefix);
        lines.push(self.invocation.to_string());
        lines
    }
}

pub trait Scheduler: Send {
    fn name(&self) -> &'static str;

    fn build_submit_command(&self, task: &TaskSubmission) -> String;

    /// Extract one native job id per submitted task from the combined `qsub` output
    ///
    /// Any malformed line, or a line count that differs from `expected`, fails the whole batch.
    fn parse_submit_response(&self, lines: &[String], expected: usize) -> Result<Vec<String>>;

    fn build_status_query(&self, job_ids: &[String]) -> String;

    /// Map native job id to native state code for every job the scheduler still knows about
    ///
    /// An empty response is a valid answer: nothing is queued or running.
    fn parse_status_response(&self, lines: &[String]) -> HashMap<String, String>;

    fn build_kill_command(&self, job_ids: &[String]) -> String;

    /// Native state codes understood by this backend
    fn state_table(&self) -> &'static [(&'static str, CanonicalState)];

    fn native_state_to_canonical(&self, code: &str) -> Result<CanonicalState> {
        self.state_table()
            .iter()
            .find(|(native, _)| *native == code)
            .map(|(_, state)| *state)
            .ok_or_else(|| Error::StatusParse { backend: self.name(), code: code.to_string() })
    }
}

/// Ask the scheduler for the canonical state of each job id, in order, in one round trip
///
/// Ids the scheduler no longer lists are `Done`.
pub fn query_states(scheduler: &dyn Scheduler, transport: &mut dyn Transport, job_ids: &[String]) -> Result<Vec<CanonicalState>> {
    if job_ids.is_empty() {
        return Ok(Vec::new());
    }
    let output = transport.execute(&scheduler.build_status_query(job_ids))?;
    if !output.success() {
        debug!("{} status query exited with {}", scheduler.name(), output.status);
    }
    let native = scheduler.parse_status_response(&output.lines);
    job_ids
        .iter()
        .map(|id| match native.get(id) {
            Some(code) => scheduler.native_state_to_canonical(code),
            None => Ok(CanonicalState::Done),
        })
        .collect()
}

/// Check the response line count before any per-line parsing
fn expect_line_count(lines: &[String], expected: usize) -> Result<()> {
    match lines.len() == expected {
        true => Ok(()),
        false => Err(Error::Submission {
            reason: format!("expected {expected} job id line(s), scheduler returned {}", lines.len()),
            output: lines.to_vec(),
        }),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    Torque,
    Sge,
}

impl SchedulerKind {
    pub fn backend(&self) -> Box<dyn Scheduler> {
        match self {
            SchedulerKind::Torque => Box::new(torque::Torque::new()),
            SchedulerKind::Sge => Box::new(sge::Sge::new()),
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchedulerKind::Torque => write!(f, "torque"),
            SchedulerKind::Sge => write!(f, "sge"),
        }
    }
}
