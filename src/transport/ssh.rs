use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::{debug, info};

use crate::credentials::Credentials;
use crate::shell;
use crate::transport::{check_names, merged, CommandOutput, Transport, TransportError};

/// `ssh` exits with 255 when the connection itself fails
static SSH_FAILURE: i32 = 255;

/// `sshpass` exit status for a rejected password
static SSHPASS_BAD_PASSWORD: i32 = 5;

/// Drive the system `ssh`/`scp` clients
///
/// Without a password the clients run in batch mode and rely on keys or an agent. With a password
/// they're wrapped in `sshpass -e`, which reads it from the environment rather than the command
/// line.
pub struct SshTransport {
    host: String,
    credentials: Option<Credentials>,
}

impl SshTransport {
    pub fn new(host: &str) -> Self {
        SshTransport { host: host.to_string(), credentials: None }
    }

    fn destination(&self) -> String {
        match &self.credentials {
            Some(c) if !c.username.is_empty() => format!("{}@{}", c.username, self.host),
            _ => self.host.clone(),
        }
    }

    fn client(&self, program: &str) -> Command {
        match self.credentials.as_ref().and_then(|c| c.password()) {
            Some(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.env("SSHPASS", password).arg("-e").arg(program);
                cmd
            }
            None => {
                let mut cmd = Command::new(program);
                cmd.arg("-o").arg("BatchMode=yes");
                cmd
            }
        }
    }

    /// Run a client process and sort out authentication failures from everything else
    fn spawn(&self, mut cmd: Command, description: &str) -> Result<Output, TransportError> {
        debug!("{:?}", &cmd);
        let output = cmd.output().map_err(|err| TransportError::Execute {
            command: description.to_string(),
            message: err.to_string(),
        })?;
        let status = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if status == SSHPASS_BAD_PASSWORD || (status == SSH_FAILURE && stderr.contains("Permission denied")) {
            return Err(TransportError::Authentication(format!("{}: {}", self.destination(), stderr.trim())));
        }
        if status == SSH_FAILURE {
            return Err(TransportError::Execute {
                command: description.to_string(),
                message: stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    fn scp(&self, from: &str, to: &str) -> Result<(), TransportError> {
        let mut cmd = self.client("scp");
        cmd.arg("-q").arg(from).arg(to);
        let output = self.spawn(cmd, &format!("scp {from} {to}"))?;
        match output.status.success() {
            true => Ok(()),
            false => Err(TransportError::Transfer(format!(
                "scp {} {}: {}",
                from,
                to,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    fn remote(&self, path: &str) -> String {
        format!("{}:{}", self.destination(), shell::quote(path))
    }
}

impl Transport for SshTransport {
    fn execute(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
        let mut cmd = self.client("ssh");
        cmd.arg(self.destination()).arg(merged(command));
        let output = self.spawn(cmd, command)?;
        let status = output.status.code().unwrap_or(-1);
        Ok(CommandOutput::new(status, &String::from_utf8_lossy(&output.stdout)))
    }

    fn put_files(&mut self, local_paths: &[PathBuf], remote_dir: &str, remote_names: &[String]) -> Result<(), TransportError> {
        check_names(local_paths, remote_names)?;
        for (local, name) in local_paths.iter().zip(remote_names) {
            let target = format!("{remote_dir}/{name}");
            info!("Uploading {} to {}:{}", local.display(), self.host, target);
            self.scp(&local.to_string_lossy(), &self.remote(&target))?;
        }
        Ok(())
    }

    fn get_files(&mut self, remote_names: &[String], local_dir: &Path, remote_dir: &str) -> Result<(), TransportError> {
        for name in remote_names {
            let source = format!("{remote_dir}/{name}");
            info!("Downloading {}:{}", self.host, source);
            self.scp(&self.remote(&source), &local_dir.join(name).to_string_lossy())?;
        }
        Ok(())
    }

    fn authenticate(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        self.credentials = Some(credentials.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_includes_username_once_authenticated() {
        let mut transport = SshTransport::new("login.cluster");
        assert_eq!(transport.destination(), "login.cluster");
        transport.authenticate(&Credentials::new("alice", None)).unwrap();
        assert_eq!(transport.destination(), "alice@login.cluster");
        assert_eq!(transport.remote("jobs/1/a b.txt"), "alice@login.cluster:'jobs/1/a b.txt'");
    }

    #[test]
    fn password_switches_to_sshpass() {
        let mut transport = SshTransport::new("login.cluster");
        transport.authenticate(&Credentials::new("alice", Some("secret"))).unwrap();
        assert_eq!(transport.client("ssh").get_program(), "sshpass");

        transport.authenticate(&Credentials::new("alice", None)).unwrap();
        assert_eq!(transport.client("ssh").get_program(), "ssh");
    }
}
