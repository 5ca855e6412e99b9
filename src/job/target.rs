use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Whether to stage the target's dependencies alongside it
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum DependencyPolicy {
    #[default]
    Include,
    TargetOnly,
}

/// The function every task runs, and the local files it needs
///
/// Finding a target's dependencies is up to the caller; they are listed here already resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub path: PathBuf,
    pub function: String,
    /// Collect return values into `<i>_output.json`
    pub produces_output: bool,
    pub dependencies: Vec<PathBuf>,
}

impl Target {
    /// Target whose function is named after the file, e.g. `fit.py` -> `fit`
    pub fn new(path: &Path) -> Result<Self> {
        let function = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Config(format!("can't name a function after {}", path.display())))?;
        Ok(Target {
            path: path.to_path_buf(),
            function: function.to_string(),
            produces_output: true,
            dependencies: Vec::new(),
        })
    }

    /// Local files to upload and the names they get in the workspace
    pub fn staged_files(&self, policy: DependencyPolicy) -> Result<(Vec<PathBuf>, Vec<String>)> {
        let mut paths = vec![self.path.clone()];
        if policy == DependencyPolicy::Include {
            paths.extend(self.dependencies.iter().filter(|d| **d != self.path).cloned());
        }
        let names = paths
            .iter()
            .map(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(String::from)
                    .ok_or_else(|| Error::Config(format!("{} has no file name", p.display())))
            })
            .collect::<Result<Vec<String>>>()?;
        let mut seen = HashSet::new();
        if let Some(clash) = names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(Error::Config(format!("more than one staged file is named {clash}")));
        }
        Ok((paths, names))
    }
}
