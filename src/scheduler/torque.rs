use std::collections::HashMap;

use log::debug;
use regex::Regex;

use crate::error::{Error, Result};
use crate::scheduler::{expect_line_count, Scheduler, TaskSubmission};
use crate::shell;
use crate::state::CanonicalState;

/// `qstat` job_state codes
static STATES: [(&str, CanonicalState); 8] = [
    ("C", CanonicalState::Done),
    ("E", CanonicalState::Running),
    ("H", CanonicalState::Held),
    ("Q", CanonicalState::Queued),
    ("R", CanonicalState::Running),
    ("T", CanonicalState::Transferring),
    ("W", CanonicalState::Waiting),
    ("S", CanonicalState::Held),
];

/// PBS / Torque backend
///
/// `qsub` prints one job id per submission (e.g. `123.headnode`) and writes errors as prose, so a
/// line with whitespace in it is a failure. `qstat -x` prints XML with one `<Job>` record per
/// job still known to the server.
pub struct Torque {
    job: Regex,
    job_id: Regex,
    job_state: Regex,
}

impl Torque {
    pub fn new() -> Self {
        Torque {
            job: Regex::new(r"(?s)<Job>(.*?)</Job>").expect("valid regex"),
            job_id: Regex::new(r"<Job_Id>\s*([^<]*?)\s*</Job_Id>").expect("valid regex"),
            job_state: Regex::new(r"<job_state>\s*([^<]*?)\s*</job_state>").expect("valid regex"),
        }
    }
}

impl Default for Torque {
    fn default() -> Self {
        Torque::new()
    }
}

impl Scheduler for Torque {
    fn name(&self) -> &'static str {
        "torque"
    }

    fn build_submit_command(&self, task: &TaskSubmission) -> String {
        let qsub = format!(
            "qsub -N {} -j oe -o {}",
            shell::quote(task.job_name),
            shell::quote(task.log_path)
        );
        shell::pipe_script(&task.script("#PBS "), &qsub)
    }

    fn parse_submit_response(&self, lines: &[String], expected: usize) -> Result<Vec<String>> {
        expect_line_count(lines, expected)?;
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let id = line.trim();
                match id.is_empty() || id.contains(char::is_whitespace) {
                    true => Err(Error::Submission {
                        reason: format!("qsub rejected task {}: {}", i + 1, id),
                        output: lines.to_vec(),
                    }),
                    false => Ok(id.to_string()),
                }
            })
            .collect()
    }

    fn build_status_query(&self, job_ids: &[String]) -> String {
        // qstat exits non-zero and complains on stderr for ids it has already forgotten
        format!("qstat -x {} 2>/dev/null", shell::join(job_ids))
    }

    fn parse_status_response(&self, lines: &[String]) -> HashMap<String, String> {
        let xml = lines.join("\n");
        let mut states = HashMap::new();
        for record in self.job.captures_iter(&xml) {
            let body = &record[1];
            match (self.job_id.captures(body), self.job_state.captures(body)) {
                (Some(id), Some(state)) => {
                    states.insert(id[1].to_string(), state[1].to_string());
                }
                _ => debug!("Skipping qstat record without id or state"),
            }
        }
        states
    }

    fn build_kill_command(&self, job_ids: &[String]) -> String {
        format!("qdel {}", shell::join(job_ids))
    }

    fn state_table(&self) -> &'static [(&'static str, CanonicalState)] {
        &STATES
    }
}
