use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::transport::{check_names, merged, CommandOutput, Transport, TransportError};

/// Submit from the machine we're running on, e.g. a cluster login node
///
/// Relative remote paths resolve against `root`, the way they would against the home directory of
/// an ssh session.
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    pub fn new(root: &Path) -> Self {
        LocalTransport { root: root.to_path_buf() }
    }

    fn resolve(&self, remote: &str) -> PathBuf {
        self.root.join(remote)
    }
}

impl Transport for LocalTransport {
    fn execute(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
        let mut sh = Command::new("sh");
        let cmd = sh.arg("-c").arg(merged(command)).current_dir(&self.root);
        debug!("{:?}", &cmd);
        let output = cmd.output().map_err(|err| TransportError::Execute {
            command: command.to_string(),
            message: err.to_string(),
        })?;
        let status = output.status.code().unwrap_or(-1);
        Ok(CommandOutput::new(status, &String::from_utf8_lossy(&output.stdout)))
    }

    fn put_files(&mut self, local_paths: &[PathBuf], remote_dir: &str, remote_names: &[String]) -> Result<(), TransportError> {
        check_names(local_paths, remote_names)?;
        let dir = self.resolve(remote_dir);
        for (local, name) in local_paths.iter().zip(remote_names) {
            info!("Copying {} to {}", local.display(), dir.join(name).display());
            fs::copy(local, dir.join(name))
                .map_err(|err| TransportError::Transfer(format!("{}: {}", local.display(), err)))?;
        }
        Ok(())
    }

    fn get_files(&mut self, remote_names: &[String], local_dir: &Path, remote_dir: &str) -> Result<(), TransportError> {
        let dir = self.resolve(remote_dir);
        for name in remote_names {
            fs::copy(dir.join(name), local_dir.join(name))
                .map_err(|err| TransportError::Transfer(format!("{}: {}", dir.join(name).display(), err)))?;
        }
        Ok(())
    }
}
