use serde_json::Value;

/// One submitted unit of work
///
/// Tasks are only created once the scheduler has accepted the whole batch, so every task has a
/// native job id and none of its fields change afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    index: usize,
    job_id: String,
    arguments: Vec<Value>,
    diary: String,
    output: Option<String>,
}

impl Task {
    pub(crate) fn new(index: usize, job_id: String, arguments: Vec<Value>, produces_output: bool) -> Self {
        Task {
            index,
            job_id,
            arguments,
            diary: diary_file(index),
            output: produces_output.then(|| output_file(index)),
        }
    }

    /// 1-based position in the batch
    pub fn index(&self) -> usize {
        self.index
    }

    /// Id assigned by the scheduler
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn diary_file(&self) -> &str {
        &self.diary
    }

    /// `None` when the target returns nothing
    pub fn output_file(&self) -> Option<&str> {
        self.output.as_deref()
    }
}

/// Field of `arguments.json` holding the task's arguments
pub fn argument_field(index: usize) -> String {
    format!("task{index}")
}

pub fn diary_file(index: usize) -> String {
    format!("{index}_diary.txt")
}

pub fn output_file(index: usize) -> String {
    format!("{index}_output.json")
}

/// Scheduler stdout/stderr for the task
pub fn log_file(index: usize) -> String {
    format!("{index}_log.txt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn artifact_names_follow_the_index() {
        let task = Task::new(3, "125.host".to_string(), vec![json!([1, 2])], true);
        assert_eq!(task.diary_file(), "3_diary.txt");
        assert_eq!(task.output_file(), Some("3_output.json"));
        assert_eq!(argument_field(3), "task3");
    }

    #[test]
    fn no_output_file_without_outputs() {
        let task = Task::new(1, "501".to_string(), vec![], false);
        assert_eq!(task.output_file(), None);
    }
}
