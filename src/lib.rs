//! Submit arrays of independent tasks to PBS/Torque or SGE clusters, track them, and clean up after
//! them

/// Settings file
pub mod config;

/// Username/password credentials and retrying rejected ones
pub mod credentials;

pub mod error;

/// Batch submission, status, kill and workspace cleanup
pub mod job;

/// Small text and JSON artifacts in a remote directory
pub mod remote_io;

/// What to submit: target function, task arguments, directives
pub mod request;

/// Scheduler-specific commands and output parsing
pub mod scheduler;

/// Quoting for remote shell command lines
pub mod shell;

/// Backend-agnostic job states
pub mod state;

/// Remote command execution and file transfer
pub mod transport;

pub use error::{Error, Result};
pub use job::{Cluster, Disposal, Job};
pub use request::JobRequest;
pub use state::{CanonicalState, JobStatus};
