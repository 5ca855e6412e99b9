//! End to end against stand-in `qsub` and `qstat` scripts run through the local transport
//!
//! Keep this the only test in the file: it changes `PATH` for the whole test process.

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use serde_json::json;
use tempfile::tempdir;

use qarray::config::Config;
use qarray::credentials::{Credentials, StaticCredentials};
use qarray::job::target::Target;
use qarray::scheduler::SchedulerKind;
use qarray::transport::local::LocalTransport;
use qarray::{Cluster, Disposal, JobRequest};

/// Runs each submitted script straight away, from `/` like a real batch job that doesn't start in
/// the submit directory, and hands out sequential ids
static QSUB: &str = r#"#!/bin/sh
n=$(cat qsub.counter 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > qsub.counter
cat > "qsub.$n.sh"
script="$PWD/qsub.$n.sh"
(cd / && sh "$script") > /dev/null 2>&1
echo "$n.fake"
"#;

/// Nothing is ever left in the queue
static QSTAT: &str = "#!/bin/sh\necho '<Data></Data>'\n";

/// Writes its argument slice name as the task's only return value
static RUNNER: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
    case "$1" in
        --field) field=$2; shift ;;
        --output) output=$2; shift ;;
    esac
    shift
done
echo "running $field"
if [ -n "$output" ]; then
    echo "{\"output\": [\"$field\"]}" > "$output"
fi
"#;

fn script(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn submit_poll_collect_and_clean_up() {
    let remote = tempdir().unwrap();
    let bin = remote.path().join("bin");
    fs::create_dir(&bin).unwrap();
    script(&bin.join("qsub"), QSUB);
    script(&bin.join("qstat"), QSTAT);
    script(&remote.path().join("runner.sh"), RUNNER);
    let path = env::var("PATH").unwrap_or_default();
    env::set_var("PATH", format!("{}:{}", bin.display(), path));

    let local = tempdir().unwrap();
    let target_path = local.path().join("square.py");
    fs::write(&target_path, "def square(x): return x * x\n").unwrap();

    let config = Config {
        scheduler: SchedulerKind::Torque,
        runtime: format!("sh {}", remote.path().join("runner.sh").display()),
        ..Config::default()
    };
    let cluster = Cluster {
        transport: Box::new(LocalTransport::new(remote.path())),
        scheduler: config.scheduler.backend(),
    };
    let request = JobRequest::new(Target::new(&target_path).unwrap(), vec![vec![json!(2)], vec![json!(3)]]);
    let mut credentials = StaticCredentials(Credentials::new("alice", None));

    let mut job = request.submit(cluster, &mut credentials, &config).unwrap();
    assert_eq!(job.job_ids(), vec!["1.fake", "2.fake"]);
    let workspace = Path::new(job.workspace().path()).to_path_buf();
    assert!(workspace.is_absolute());
    assert!(workspace.starts_with(remote.path().canonicalize().unwrap()) || workspace.starts_with(remote.path()));
    assert!(workspace.join("square.py").is_file());
    assert!(workspace.join("arguments.json").is_file());
    assert_eq!(fs::read_to_string(workspace.join("command.sh")).unwrap().lines().count(), 2);

    assert!(job.status().unwrap().is_done());
    assert_eq!(job.read_output(1).unwrap(), Some(vec![json!("task1")]));
    assert_eq!(job.read_output(2).unwrap(), Some(vec![json!("task2")]));
    assert!(job.read_diary(2).unwrap().contains("running task2"));

    assert_eq!(job.close().unwrap(), Disposal::Removed);
    assert!(!workspace.exists());
}
