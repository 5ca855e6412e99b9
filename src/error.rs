use thiserror::Error;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum Error {
    /// Credentials were rejected on every attempt, or the provider gave up
    #[error("Authentication failed after {attempts} attempt(s): {message}")]
    Authentication { attempts: u32, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The batch submission response was short or malformed. No job is returned.
    #[error("Submission failed: {reason}\n--- remote output ---\n{}", .output.join("\n"))]
    Submission { reason: String, output: Vec<String> },

    /// A scheduler reported a state code missing from the backend's table
    #[error("{backend} reported unknown job state code '{code}'")]
    StatusParse { backend: &'static str, code: String },

    #[error("Refusing to remove '{path}': not a workspace under '{root}'")]
    UnsafeCleanup { path: String, root: String },

    /// The remote shell didn't report an absolute path for a new workspace's root
    #[error("Couldn't resolve workspace '{path}', remote shell printed '{output}'")]
    UnresolvedWorkspace { path: String, output: String },

    #[error("No tasks to submit")]
    NoTasks,

    #[error("Job has no task {0}")]
    NoSuchTask(usize),

    #[error("Bad configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] tinytemplate::error::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
