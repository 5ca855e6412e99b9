use rand::Rng;

use crate::error::{Error, Result};
use crate::shell;

/// Directory under the working directory that holds every job's workspace
static JOBS_ROOT: &str = "jobs";

/// Workspace names are random integers below 2^53
static NAME_BITS: u32 = 53;

/// A remote directory owned by exactly one job
///
/// The path is `[working_dir/]jobs/<n>`. Only paths of that shape are ever removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workspace {
    root: String,
    path: String,
}

impl Workspace {
    /// Pick a fresh workspace path under `working_dir` (the remote home directory when `None`)
    pub fn allocate(working_dir: Option<&str>) -> Self {
        let n: u64 = rand::thread_rng().gen_range(0..1u64 << NAME_BITS);
        let root = root(working_dir);
        let path = format!("{root}/{n}");
        Workspace { root, path }
    }

    /// A workspace at an existing path, e.g. one reported by an earlier run
    pub fn at(working_dir: Option<&str>, path: &str) -> Self {
        Workspace { root: root(working_dir), path: path.trim_end_matches('/').to_string() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Remote path of a file in the workspace
    pub fn file(&self, name: &str) -> String {
        format!("{}/{}", self.path, name)
    }

    /// Create the workspace and print the absolute path of its root
    pub fn create_command(&self) -> String {
        format!("mkdir -p {} && cd {} && pwd", shell::quote(&self.path), shell::quote(&self.root))
    }

    /// The same workspace addressed through `root_dir`, the absolute path `create_command` printed
    ///
    /// Batch jobs don't start in the submit directory, so everything rendered into a job script
    /// must use this form.
    pub fn resolved(&self, root_dir: &str) -> Result<Workspace> {
        let root_dir = root_dir.trim();
        let name = self.path.rsplit('/').next().unwrap_or_default();
        match root_dir.starts_with('/') {
            true => Ok(Workspace { root: root_dir.to_string(), path: format!("{root_dir}/{name}") }),
            false => Err(Error::UnresolvedWorkspace { path: self.path.clone(), output: root_dir.to_string() }),
        }
    }

    /// `rm -rf` of the workspace, refused unless the path is `<root>/<digits>`
    pub fn removal_command(&self) -> Result<String> {
        let name = self.path.strip_prefix(&self.root).and_then(|rest| rest.strip_prefix('/'));
        match name {
            Some(n) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => {
                Ok(format!("rm -rf {}", shell::quote(&self.path)))
            }
            _ => Err(Error::UnsafeCleanup { path: self.path.clone(), root: self.root.clone() }),
        }
    }
}

fn root(working_dir: Option<&str>) -> String {
    match working_dir {
        None | Some("") => JOBS_ROOT.to_string(),
        Some(d) => format!("{}/{JOBS_ROOT}", d.trim_end_matches('/')),
    }
}
