use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Backend-agnostic job state.
///
/// Every scheduler's native codes collapse into this set. A task that no longer appears in the
/// scheduler's live queue is reported as `Done`: finished, failed and vanished jobs are not told
/// apart here, the task's diary and output artifacts are the place to look for that.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CanonicalState {
    Done,
    Held,
    Queued,
    Running,
    Transferring,
    Waiting,
    Error,
}

impl CanonicalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalState::Done => "done",
            CanonicalState::Held => "held",
            CanonicalState::Queued => "queued",
            CanonicalState::Running => "running",
            CanonicalState::Transferring => "transferring",
            CanonicalState::Waiting => "waiting",
            CanonicalState::Error => "error",
        }
    }
}

impl fmt::Display for CanonicalState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate status of a job: the sorted set of distinct task states
///
/// Displays as the states joined with `/`, e.g. `queued/running`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobStatus {
    states: BTreeSet<CanonicalState>,
}

impl JobStatus {
    pub fn states(&self) -> impl Iterator<Item = CanonicalState> + '_ {
        self.states.iter().copied()
    }

    pub fn contains(&self, state: CanonicalState) -> bool {
        self.states.contains(&state)
    }

    /// True when every task is done. A job with no tasks has nothing left to wait for.
    pub fn is_done(&self) -> bool {
        self.states.iter().all(|s| *s == CanonicalState::Done)
    }
}

impl FromIterator<CanonicalState> for JobStatus {
    fn from_iter<I: IntoIterator<Item = CanonicalState>>(iter: I) -> Self {
        JobStatus { states: iter.into_iter().collect() }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let labels: Vec<&str> = self.states.iter().map(|s| s.as_str()).collect();
        write!(f, "{}", labels.join("/"))
    }
}
