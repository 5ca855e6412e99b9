//! Remote command execution and file transfer
//!
//! A `Transport` is one session with the cluster's submit host. It is used by exactly one job at a
//! time and is not assumed to be safe for concurrent use, but it can move to another thread along
//! with its job.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::credentials::Credentials;

/// Run commands through the local `sh`, rooted at a directory
pub mod local;

/// Run commands on a remote host through the system `ssh` and `scp` binaries
pub mod ssh;

#[cfg(test)]
pub mod mock;

#[derive(Error, Debug)]
pub enum TransportError {
    /// The remote side rejected the credentials
    #[error("Authentication rejected: {0}")]
    Authentication(String),

    #[error("Can't run `{command}`: {message}")]
    Execute { command: String, message: String },

    #[error("`{command}` exited with status {status}: {}", .output.join("\n"))]
    Failed { command: String, status: i32, output: Vec<String> },

    #[error("File transfer failed: {0}")]
    Transfer(String),
}

/// Exit status and output lines of a remote command, stdout and stderr interleaved
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub lines: Vec<String>,
}

impl CommandOutput {
    pub fn new(status: i32, text: &str) -> Self {
        CommandOutput { status, lines: text.lines().map(String::from).collect() }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

pub trait Transport: Send {
    /// Run `command` in the remote shell. A non-zero exit status is not an error at this level.
    fn execute(&mut self, command: &str) -> Result<CommandOutput, TransportError>;

    /// Copy `local_paths` into `remote_dir`, renaming each to the matching entry of `remote_names`
    fn put_files(&mut self, local_paths: &[PathBuf], remote_dir: &str, remote_names: &[String]) -> Result<(), TransportError>;

    /// Copy `remote_names` from `remote_dir` into `local_dir`, keeping their names
    fn get_files(&mut self, remote_names: &[String], local_dir: &Path, remote_dir: &str) -> Result<(), TransportError>;

    /// Use these credentials for subsequent calls
    fn authenticate(&mut self, _credentials: &Credentials) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Run a command, treating a non-zero exit status as a failure
pub fn run(transport: &mut dyn Transport, command: &str) -> Result<Vec<String>, TransportError> {
    let output = transport.execute(command)?;
    match output.success() {
        true => Ok(output.lines),
        false => Err(TransportError::Failed {
            command: command.to_string(),
            status: output.status,
            output: output.lines,
        }),
    }
}

/// Wrap a command so its stderr is interleaved with stdout, keeping the command's own redirections
fn merged(command: &str) -> String {
    format!("{{ {command}\n}} 2>&1")
}

fn check_names(local_paths: &[PathBuf], remote_names: &[String]) -> Result<(), TransportError> {
    match local_paths.len() == remote_names.len() {
        true => Ok(()),
        false => Err(TransportError::Transfer(format!(
            "{} local file(s) but {} remote name(s)",
            local_paths.len(),
            remote_names.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_split_into_lines() {
        let out = CommandOutput::new(0, "123.host\n124.host\n");
        assert_eq!(out.lines, vec!["123.host", "124.host"]);
        assert!(out.success());
    }

    #[test]
    fn merged_keeps_inner_redirections() {
        assert_eq!(merged("qstat -x 1 2>/dev/null"), "{ qstat -x 1 2>/dev/null\n} 2>&1");
    }
}
