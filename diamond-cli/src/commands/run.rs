use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use diamond_service::events::LogLevel;
use diamond_service::{progress_channel, JoinEvent, Outcome, TopologyParser, TopologyValidator};

/// Start jobs of a topology and run until idle
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the topology YAML file
    pub topology: PathBuf,

    /// Job to start manually (can be repeated)
    #[arg(long = "start", short = 's', value_name = "JOB", required = true)]
    pub start: Vec<String>,

    /// Override the maximum number of concurrent runs
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let path = &args.topology;
    if !path.exists() {
        color_eyre::eyre::bail!("Topology file not found: {}", path.display());
    }

    output::status("Loading", &format!("{}", path.display()));
    let content = std::fs::read_to_string(path)?;
    let mut topology = TopologyParser::parse_and_validate(&content)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;
    for warning in TopologyValidator::report(&topology).warnings {
        output::warning(&format!("[{}] {}", warning.path, warning.message));
    }
    if let Some(max) = args.max_parallel {
        topology.settings.executor.max_parallel_runs = max;
    }
    output::info(&format!("{} job(s) loaded", topology.jobs.len()));

    let (tx, mut rx) = progress_channel();
    let executor = topology.build_executor(Some(tx))?;
    for job in &args.start {
        executor.trigger(job)?;
    }

    output::header(&format!("Starting {}", args.start.join(", ")));
    let handle = tokio::spawn(async move { executor.run_until_idle().await });

    while let Some(event) = rx.recv().await {
        print_event(&event);
    }

    let runs = handle.await??;
    let worst = Outcome::fold(runs.iter().filter_map(|run| run.outcome()));

    println!();
    output::header(&format!("{} run(s) finished", runs.len()));
    for run in &runs {
        if let Some(outcome) = run.outcome() {
            output::outcome_line(
                outcome,
                &format!("  {}#{} {}", run.job_name(), run.id(), outcome),
            );
        }
    }

    if worst.is_worse_than(Outcome::Unstable) {
        output::failure(&format!("Worst outcome: {}", worst));
        std::process::exit(1);
    }
    output::success(&format!("Worst outcome: {}", worst));
    Ok(())
}

fn print_event(event: &JoinEvent) {
    match event {
        JoinEvent::RunStarted { job, run, cause } => {
            println!("  {}#{} started ({})", job, run, cause);
        }
        JoinEvent::RunCompleted { job, run, outcome } => {
            output::outcome_line(*outcome, &format!("  {}#{} {}", job, run, outcome));
        }
        JoinEvent::BarrierAttached {
            job,
            run,
            pending,
            targets,
        } => output::barrier(&format!(
            "{}#{} waits for [{}] before starting [{}]",
            job,
            run,
            pending.join(", "),
            targets.join(", ")
        )),
        JoinEvent::BarrierDiscarded { job, run, reason } => {
            output::warning(&format!("{}#{} barrier discarded: {}", job, run, reason));
        }
        JoinEvent::DependenciesAdded { job, run, added } => output::barrier(&format!(
            "{}#{} now also waits for [{}]",
            job,
            run,
            added.join(", ")
        )),
        JoinEvent::JobReleased {
            barrier_job,
            barrier_run,
            job,
            remaining,
        } => output::dim(&format!(
            "      {}#{} released {} ({} remaining)",
            barrier_job, barrier_run, job, remaining
        )),
        JoinEvent::BarrierCompleted { job, run, outcome } => {
            output::barrier(&format!("{}#{} joined as {}", job, run, outcome));
        }
        JoinEvent::ThresholdNotMet {
            job,
            run,
            outcome,
            threshold,
        } => output::warning(&format!(
            "{}#{} joined as {}, below threshold {}",
            job, run, outcome, threshold
        )),
        JoinEvent::JoinScheduled { job, target } => {
            output::barrier(&format!("{} scheduled {}", job, target));
        }
        JoinEvent::JoinSkipped {
            job,
            target,
            reason,
        } => output::warning(&format!("{} skipped {}: {}", job, target, reason)),
        JoinEvent::ActionStarted { job, action } => {
            output::dim(&format!("      {} running post-join {}", job, action));
        }
        JoinEvent::ActionFailed {
            job,
            action,
            message,
        } => output::error(&format!("{} post-join {} failed: {}", job, action, message)),
        JoinEvent::Log {
            level,
            message,
            job,
        } => {
            let line = match job {
                Some(job) => format!("[{}] {}", job, message),
                None => message.clone(),
            };
            match level {
                LogLevel::Debug => output::dim(&line),
                LogLevel::Info => output::run_output(&line),
                LogLevel::Warning => output::warning(&line),
                LogLevel::Error => output::error(&line),
            }
        }
    }
}
