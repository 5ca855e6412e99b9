use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::job::invocation::DEFAULT_TEMPLATE;
use crate::scheduler::{Directives, SchedulerKind};

/// Settings for talking to one cluster, read from a JSON file
///
/// Every field has a default, so `{}` is a valid configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerKind,
    /// Submit host. Commands run locally when unset.
    pub host: Option<String>,
    /// Remote directory that holds `jobs/`, relative to the remote home directory
    pub working_dir: Option<String>,
    /// Scheduler job names are `<job_name><index>`
    pub job_name: String,
    /// Command that runs a target function on the execution host
    pub runtime: String,
    /// Replaces the built-in invocation template
    pub invocation_template: Option<PathBuf>,
    /// Directives added to every submission
    pub directives: Directives,
    pub auth_attempts: u32,
    pub poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scheduler: SchedulerKind::Torque,
            host: None,
            working_dir: None,
            job_name: "task".to_string(),
            runtime: "qarray-runner".to_string(),
            invocation_template: None,
            directives: Directives::default(),
            auth_attempts: 3,
            poll_interval_secs: 30,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        info!("Reading configuration at {}", path.display());
        let json = fs::read_to_string(path).map_err(|err| {
            warn!("Can't read configuration at path {}: {}", path.display(), err);
            err
        })?;
        let config: Config = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth_attempts == 0 {
            return Err(Error::Config("auth_attempts must be at least 1".to_string()));
        }
        if self.runtime.trim().is_empty() {
            return Err(Error::Config("runtime can't be empty".to_string()));
        }
        // qsub wants names that start with a letter and stay clear of shell and path syntax
        let mut chars = self.job_name.chars();
        let valid = chars.next().map_or(false, |c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        match valid {
            true => Ok(()),
            false => Err(Error::Config(format!("job_name '{}' isn't a valid scheduler job name", self.job_name))),
        }
    }

    /// Text of the invocation template in use
    pub fn invocation_template(&self) -> Result<String> {
        match &self.invocation_template {
            Some(path) => {
                info!("Using invocation template {}", path.display());
                Ok(fs::read_to_string(path)?)
            }
            None => Ok(DEFAULT_TEMPLATE.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn empty_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qarray.json");
        fs::write(&path, "{}").unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn fields_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qarray.json");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{ "scheduler": "sge", "host": "login.cluster", "directives": "-l h_rt=01:00:00\n-q short", "auth_attempts": 5 }}"#
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.scheduler, SchedulerKind::Sge);
        assert_eq!(config.host.as_deref(), Some("login.cluster"));
        assert_eq!(config.directives.lines().len(), 2);
        assert_eq!(config.auth_attempts, 5);
        assert_eq!(config.job_name, "task");
    }

    #[test]
    fn invalid_json_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qarray.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Json(_))));
    }

    #[test]
    fn zero_auth_attempts_is_rejected() {
        let config = Config { auth_attempts: 0, ..Config::default() };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn job_name_must_suit_qsub() {
        for name in ["", "1task", "my task", "a/b"] {
            let config = Config { job_name: name.to_string(), ..Config::default() };
            assert!(config.validate().is_err(), "{name} was accepted");
        }
    }

    #[test]
    fn template_can_be_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invocation.txt");
        fs::write(&path, "{runtime} {field}").unwrap();
        let config = Config { invocation_template: Some(path), ..Config::default() };
        assert_eq!(config.invocation_template().unwrap(), "{runtime} {field}");
        assert_eq!(Config::default().invocation_template().unwrap(), DEFAULT_TEMPLATE);
    }
}
