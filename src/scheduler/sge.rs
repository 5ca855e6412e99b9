use std::collections::HashMap;

use log::debug;
use regex::Regex;

use crate::error::{Error, Result};
use crate::scheduler::{expect_line_count, Scheduler, TaskSubmission};
use crate::shell;
use crate::state::CanonicalState;

/// `qstat` state codes, collapsed onto the canonical states
///
/// Suspension of any kind (by the user, the queue, or an alarm threshold) is reported as `Held`;
/// jobs being deleted keep reporting what they are still doing.
static STATES: [(&str, CanonicalState); 27] = [
    ("qw", CanonicalState::Queued),
    ("w", CanonicalState::Waiting),
    ("hqw", CanonicalState::Held),
    ("hRwq", CanonicalState::Held),
    ("hr", CanonicalState::Held),
    ("ht", CanonicalState::Held),
    ("r", CanonicalState::Running),
    ("Rr", CanonicalState::Running),
    ("dr", CanonicalState::Running),
    ("t", CanonicalState::Transferring),
    ("Rt", CanonicalState::Transferring),
    ("dt", CanonicalState::Transferring),
    ("s", CanonicalState::Held),
    ("ts", CanonicalState::Held),
    ("S", CanonicalState::Held),
    ("tS", CanonicalState::Held),
    ("T", CanonicalState::Held),
    ("tT", CanonicalState::Held),
    ("Rs", CanonicalState::Held),
    ("Rts", CanonicalState::Held),
    ("RS", CanonicalState::Held),
    ("RtS", CanonicalState::Held),
    ("RT", CanonicalState::Held),
    ("RtT", CanonicalState::Held),
    ("Eqw", CanonicalState::Error),
    ("Ehqw", CanonicalState::Error),
    ("EhRqw", CanonicalState::Error),
];

/// Sun Grid Engine backend
pub struct Sge {
    submitted: Regex,
    job: Regex,
    job_number: Regex,
    state: Regex,
}

impl Sge {
    pub fn new() -> Self {
        Sge {
            submitted: Regex::new(r#"^Your job(?:-array)? (\S+) \(".*"\) has been submitted$"#).expect("valid regex"),
            job: Regex::new(r"(?s)<job_list[^>]*>(.*?)</job_list>").expect("valid regex"),
            job_number: Regex::new(r"<JB_job_number>\s*([^<]*?)\s*</JB_job_number>").expect("valid regex"),
            state: Regex::new(r"<state>\s*([^<]*?)\s*</state>").expect("valid regex"),
        }
    }
}

impl Default for Sge {
    fn default() -> Self {
        Sge::new()
    }
}

impl Scheduler for Sge {
    fn name(&self) -> &'static str {
        "sge"
    }

    fn build_submit_command(&self, task: &TaskSubmission) -> String {
        let qsub = format!(
            "qsub -S /bin/sh -N {} -j y -o {}",
            shell::quote(task.job_name),
            shell::quote(task.log_path)
        );
        shell::pipe_script(&task.script("#$ "), &qsub)
    }

    fn parse_submit_response(&self, lines: &[String], expected: usize) -> Result<Vec<String>> {
        expect_line_count(lines, expected)?;
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| match self.submitted.captures(line.trim()) {
                Some(caps) => Ok(caps[1].to_string()),
                None => Err(Error::Submission {
                    reason: format!("qsub rejected task {}: {}", i + 1, line.trim()),
                    output: lines.to_vec(),
                }),
            })
            .collect()
    }

    /// SGE lists every job of the calling user; ids not in the listing are finished
    fn build_status_query(&self, _job_ids: &[String]) -> String {
        "qstat -xml -u \"$USER\"".to_string()
    }

    fn parse_status_response(&self, lines: &[String]) -> HashMap<String, String> {
        let xml = lines.join("\n");
        let mut states = HashMap::new();
        for record in self.job.captures_iter(&xml) {
            let body = &record[1];
            match (self.job_number.captures(body), self.state.captures(body)) {
                (Some(id), Some(state)) => {
                    states.insert(id[1].to_string(), state[1].to_string());
                }
                _ => debug!("Skipping qstat job_list without number or state"),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Directives;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn submit_response_yields_job_number() {
        let out = lines(&[r#"Your job 501 ("j1") has been submitted"#]);
        assert_eq!(Sge::new().parse_submit_response(&out, 1).unwrap(), vec!["501"]);
    }

    #[test]
    fn unrecognised_line_fails_the_batch() {
        let out = lines(&[
            r#"Your job 501 ("task1") has been submitted"#,
            "Unable to run job: denied: host is not a submit host.",
        ]);
        assert!(matches!(Sge::new().parse_submit_response(&out, 2), Err(Error::Submission { .. })));
    }

    #[test]
    fn line_count_mismatch_fails_the_batch() {
        let out = lines(&[r#"Your job 501 ("task1") has been submitted"#]);
        assert!(Sge::new().parse_submit_response(&out, 2).is_err());
    }

    #[test]
    fn submit_command_uses_sge_directive_prefix() {
        let directives = Directives::from("-l h_rt=01:00:00");
        let task = TaskSubmission {
            index: 2,
            job_name: "task2",
            invocation: "run",
            directives: &directives,
            log_path: "jobs/7/2_log.txt",
        };
        let cmd = Sge::new().build_submit_command(&task);
        assert_eq!(
            cmd,
            "printf '%s\\n' '#$ -l h_rt=01:00:00' run | qsub -S /bin/sh -N task2 -j y -o jobs/7/2_log.txt"
        );
    }

    #[test]
    fn status_response_is_parsed_from_xml() {
        let xml = lines(&[
            "<?xml version='1.0'?>",
            "<job_info>",
            "  <queue_info>",
            "    <job_list state=\"running\">",
            "      <JB_job_number>501</JB_job_number>",
            "      <JB_name>task1</JB_name>",
            "      <state>r</state>",
            "    </job_list>",
            "  </queue_info>",
            "  <job_info>",
            "    <job_list state=\"pending\">",
            "      <JB_job_number>502</JB_job_number>",
            "      <state>hqw</state>",
            "    </job_list>",
            "  </job_info>",
            "</job_info>",
        ]);
        let states = Sge::new().parse_status_response(&xml);
        assert_eq!(states.len(), 2);
        assert_eq!(states["501"], "r");
        assert_eq!(states["502"], "hqw");
    }

    #[test]
    fn empty_listing_is_empty() {
        let xml = lines(&["<?xml version='1.0'?>", "<job_info><queue_info></queue_info></job_info>"]);
        assert!(Sge::new().parse_status_response(&xml).is_empty());
    }

    #[test]
    fn error_and_suspended_codes_collapse() {
        let sge = Sge::new();
        assert_eq!(sge.native_state_to_canonical("Eqw").unwrap(), CanonicalState::Error);
        assert_eq!(sge.native_state_to_canonical("S").unwrap(), CanonicalState::Held);
        assert_eq!(sge.native_state_to_canonical("t").unwrap(), CanonicalState::Transferring);
    }
}
