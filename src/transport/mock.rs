//! In-memory transport for tests: scripted command output and a shared record of every call

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::credentials::Credentials;
use crate::transport::{check_names, CommandOutput, Transport, TransportError};

#[derive(Default, Debug)]
pub struct Record {
    pub commands: Vec<String>,
    /// Remote path -> contents of every file put so far
    pub files: BTreeMap<String, String>,
}

impl Record {
    pub fn commands_starting_with(&self, prefix: &str) -> Vec<&String> {
        self.commands.iter().filter(|c| c.starts_with(prefix)).collect()
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    responses: Vec<(String, CommandOutput)>,
    record: Arc<Mutex<Record>>,
    credentials: Option<Credentials>,
    rejections: u32,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        ScriptedTransport::default()
    }

    /// Answer commands starting with `prefix`. Unscripted commands succeed with no output.
    pub fn respond(mut self, prefix: &str, status: i32, lines: &[&str]) -> Self {
        let output = CommandOutput { status, lines: lines.iter().map(|l| l.to_string()).collect() };
        self.responses.push((prefix.to_string(), output));
        self
    }

    /// Reject the first `n` calls with an authentication error
    pub fn reject_first(mut self, n: u32) -> Self {
        self.rejections = n;
        self
    }

    pub fn record(&self) -> Arc<Mutex<Record>> {
        Arc::clone(&self.record)
    }

    pub fn authenticated_as(&self) -> Option<Credentials> {
        self.credentials.clone()
    }

    fn log(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap()
    }

    fn gate(&mut self) -> Result<(), TransportError> {
        match self.rejections {
            0 => Ok(()),
            _ => {
                self.rejections -= 1;
                Err(TransportError::Authentication("Permission denied".to_string()))
            }
        }
    }
}

impl Transport for ScriptedTransport {
    fn execute(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
        self.gate()?;
        self.log().commands.push(command.to_string());
        Ok(self
            .responses
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }

    fn put_files(&mut self, local_paths: &[PathBuf], remote_dir: &str, remote_names: &[String]) -> Result<(), TransportError> {
        self.gate()?;
        check_names(local_paths, remote_names)?;
        for (local, name) in local_paths.iter().zip(remote_names) {
            let content = fs::read_to_string(local).map_err(|err| TransportError::Transfer(err.to_string()))?;
            self.log().files.insert(format!("{remote_dir}/{name}"), content);
        }
        Ok(())
    }

    fn get_files(&mut self, remote_names: &[String], local_dir: &Path, remote_dir: &str) -> Result<(), TransportError> {
        self.gate()?;
        for name in remote_names {
            let path = format!("{remote_dir}/{name}");
            let content = self
                .log()
                .files
                .get(&path)
                .cloned()
                .ok_or_else(|| TransportError::Transfer(format!("{path}: no such file")))?;
            fs::write(local_dir.join(name), content).map_err(|err| TransportError::Transfer(err.to_string()))?;
        }
        Ok(())
    }

    fn authenticate(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        self.credentials = Some(credentials.clone());
        Ok(())
    }
}
