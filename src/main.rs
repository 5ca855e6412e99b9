use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde_json::json;

use qarray::config::Config;
use qarray::credentials::{authenticated, CredentialCache, EnvCredentials};
use qarray::job::target::{DependencyPolicy, Target};
use qarray::request::{read_arguments, JobRequest};
use qarray::scheduler::{query_states, Directives, SchedulerKind};
use qarray::transport::local::LocalTransport;
use qarray::transport::ssh::SshTransport;
use qarray::transport::{self, Transport};
use qarray::{CanonicalState, Cluster, Disposal};

#[derive(Parser)]
#[command(author, version, about = "Submit task arrays to PBS/Torque or SGE clusters")]
struct Args {
    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    scheduler: Option<SchedulerKind>,

    /// Submit host, reached with ssh. Without it commands run locally.
    #[arg(long)]
    host: Option<String>,

    /// Stands in for the remote home directory when running locally
    #[arg(long)]
    local_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one task per entry of the arguments file
    Submit {
        /// File defining the function to run
        #[arg(long)]
        target: PathBuf,

        /// Function name, defaults to the target's file stem
        #[arg(long)]
        function: Option<String>,

        /// JSON array holding one array of positional arguments per task
        #[arg(long)]
        arguments: PathBuf,

        /// The function returns nothing worth collecting
        #[arg(long)]
        no_output: bool,

        /// Extra file the target needs, repeat as required
        #[arg(long)]
        dependency: Vec<PathBuf>,

        /// Stage only the target file
        #[arg(long)]
        no_dependencies: bool,

        /// Scheduler directive, repeat as required
        #[arg(long)]
        directive: Vec<String>,

        #[arg(long)]
        working_dir: Option<String>,

        /// Poll until every task is done, print outputs, then clean up
        #[arg(long)]
        wait: bool,
    },
    /// Print the state of scheduler job ids
    Status {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete scheduler job ids
    Kill {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    info!("starting qarray {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(scheduler) = args.scheduler {
        config.scheduler = scheduler;
    }
    if args.host.is_some() {
        config.host = args.host.clone();
    }

    let mut credentials = CredentialCache::new(EnvCredentials::default());
    let mut cluster = Cluster {
        transport: open_transport(&config, args.local_root.clone())?,
        scheduler: config.scheduler.backend(),
    };

    match args.command {
        Commands::Submit {
            target,
            function,
            arguments,
            no_output,
            dependency,
            no_dependencies,
            directive,
            working_dir,
            wait,
        } => {
            let mut target = Target::new(&target)?;
            if let Some(function) = function {
                target.function = function;
            }
            target.produces_output = !no_output;
            target.dependencies = dependency;

            let mut request = JobRequest::new(target, read_arguments(&arguments)?);
            request.directives = Directives::from(directive);
            request.working_dir = working_dir;
            if no_dependencies {
                request.dependencies = DependencyPolicy::TargetOnly;
            }

            let mut job = request.submit(cluster, &mut credentials, &config).context("submitting job")?;
            println!("{} {}", job.workspace().path(), job.job_ids().join(" "));
            if !wait {
                job.keep();
                return Ok(());
            }

            let interval = Duration::from_secs(config.poll_interval_secs);
            loop {
                let status = job.status()?;
                let elapsed = Utc::now() - job.submitted_at();
                info!("{} after {}s", status, elapsed.num_seconds());
                if status.is_done() {
                    break;
                }
                if status.contains(CanonicalState::Error) {
                    warn!("Some tasks are in an error state, no longer waiting");
                    break;
                }
                thread::sleep(interval);
            }

            for index in 1..=job.tasks().len() {
                match job.read_output(index) {
                    Ok(Some(output)) => println!("{}", json!({ "task": index, "output": output })),
                    Ok(None) => {}
                    Err(err) => warn!("No output for task {index}: {err}"),
                }
            }
            match job.close()? {
                Disposal::Removed => info!("Workspace removed"),
                Disposal::Retained(status) => warn!("Workspace kept, tasks are {status}"),
            }
        }
        Commands::Status { ids } => {
            authenticate(&mut cluster, &mut credentials, &config)?;
            let states = query_states(cluster.scheduler.as_ref(), cluster.transport.as_mut(), &ids)?;
            for (id, state) in ids.iter().zip(states) {
                println!("{id} {state}");
            }
        }
        Commands::Kill { ids } => {
            authenticate(&mut cluster, &mut credentials, &config)?;
            let command = cluster.scheduler.build_kill_command(&ids);
            transport::run(cluster.transport.as_mut(), &command).with_context(|| format!("running {command}"))?;
        }
    }

    Ok(())
}

fn open_transport(config: &Config, local_root: Option<PathBuf>) -> Result<Box<dyn Transport>> {
    match &config.host {
        Some(host) => {
            info!("Connecting to {host} with ssh");
            Ok(Box::new(SshTransport::new(host)))
        }
        None => {
            let root = match local_root {
                Some(root) => root,
                None => env::current_dir()?,
            };
            info!("Running scheduler commands locally in {}", root.display());
            Ok(Box::new(LocalTransport::new(&root)))
        }
    }
}

/// Make a first round trip so rejected credentials are retried before the real command
fn authenticate(cluster: &mut Cluster, credentials: &mut CredentialCache<EnvCredentials>, config: &Config) -> Result<()> {
    authenticated(cluster.transport.as_mut(), credentials, config.auth_attempts, |t| transport::run(t, "true"))?;
    Ok(())
}
