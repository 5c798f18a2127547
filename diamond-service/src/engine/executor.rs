// Local Executor
// Drives queued runs through the runner and the join coordinator on tokio tasks

use super::local::LocalEngine;
use super::runner::JobRunner;
use crate::error::{ServiceError, ServiceResult};
use crate::events::{EventSender, JoinEvent, ProgressSender};
use crate::join::JoinRunCoordinator;
use crate::model::{Cause, Run};
use crate::registry::{Registry, Scheduler};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Configuration for the local executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum runs executing at once (0 = unlimited)
    pub max_parallel_runs: usize,
    /// Delay for jobs that do not set their own, in milliseconds
    pub default_delay_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel_runs: 0,
            default_delay_ms: 0,
        }
    }
}

/// Everything a run task needs, cloned into each task
#[derive(Clone)]
struct RunContext {
    engine: Arc<LocalEngine>,
    coordinator: Arc<JoinRunCoordinator>,
    runner: Arc<dyn JobRunner>,
    semaphore: Option<Arc<Semaphore>>,
    event_tx: Option<ProgressSender>,
}

/// Executes queued runs until nothing is queued or running.
///
/// Runs start on the driving task, so `on_run_started` for a run always
/// happens before any of its downstream runs exist. Runs finish on worker
/// tasks and call `on_run_finished` concurrently.
pub struct LocalExecutor {
    engine: Arc<LocalEngine>,
    coordinator: Arc<JoinRunCoordinator>,
    runner: Arc<dyn JobRunner>,
    config: ExecutorConfig,
    event_tx: Option<ProgressSender>,
}

impl LocalExecutor {
    pub fn new(
        engine: Arc<LocalEngine>,
        coordinator: Arc<JoinRunCoordinator>,
        runner: Arc<dyn JobRunner>,
    ) -> Self {
        Self {
            engine,
            coordinator,
            runner,
            config: ExecutorConfig::default(),
            event_tx: None,
        }
    }

    /// Set executor configuration
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set progress event sender
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn engine(&self) -> &Arc<LocalEngine> {
        &self.engine
    }

    pub fn coordinator(&self) -> &Arc<JoinRunCoordinator> {
        &self.coordinator
    }

    /// Queue a manual start of `job`
    pub fn trigger(&self, job: &str) -> ServiceResult<()> {
        let job = self
            .engine
            .find_job(job)
            .ok_or_else(|| ServiceError::NotFound(format!("job '{}'", job)))?;
        self.engine.schedule(&job, Cause::manual())
    }

    /// Run everything queued, and everything that schedules, to completion.
    ///
    /// Returns the finished runs in completion order.
    pub async fn run_until_idle(&self) -> ServiceResult<Vec<Arc<Run>>> {
        let ctx = RunContext {
            engine: self.engine.clone(),
            coordinator: self.coordinator.clone(),
            runner: self.runner.clone(),
            semaphore: (self.config.max_parallel_runs > 0)
                .then(|| Arc::new(Semaphore::new(self.config.max_parallel_runs))),
            event_tx: self.event_tx.clone(),
        };

        let mut tasks = JoinSet::new();
        let mut finished = Vec::new();
        loop {
            for request in self.engine.take_queued() {
                let run = self.engine.create_run(&request.job, request.causes)?;
                let cause = run
                    .causes()
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                self.event_tx
                    .send_event(JoinEvent::run_started(run.job_name(), run.id(), cause));

                if let Err(e) = self.coordinator.on_run_started(&run) {
                    warn!(run = %run, error = %e, "join coordination failed on start");
                    self.event_tx
                        .send_event(JoinEvent::error(e.to_string(), Some(run.job_name().to_string())));
                }

                let ctx = ctx.clone();
                tasks.spawn(async move { execute_run(ctx, run).await });
            }

            match tasks.join_next().await {
                None => break,
                Some(Ok(Ok(run))) => finished.push(run),
                Some(Ok(Err(e))) => return Err(e),
                Some(Err(e)) => {
                    return Err(ServiceError::SchedulingFailed(format!(
                        "run task panicked: {}",
                        e
                    )))
                }
            }
        }

        debug!(runs = finished.len(), "executor idle");
        Ok(finished)
    }
}

async fn execute_run(ctx: RunContext, run: Arc<Run>) -> ServiceResult<Arc<Run>> {
    let _permit = match &ctx.semaphore {
        Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
        None => None,
    };

    let job = ctx
        .engine
        .find_job(run.job_name())
        .ok_or_else(|| ServiceError::NotFound(format!("job '{}'", run.job_name())))?;

    let outcome = ctx.runner.run(&job, &run).await;
    run.finish(outcome)?;
    ctx.event_tx
        .send_event(JoinEvent::run_completed(run.job_name(), run.id(), outcome));

    if let Err(e) = ctx.coordinator.on_run_finished(&run) {
        warn!(run = %run, error = %e, "join coordination failed on finish");
    }

    // Follow triggering edges; union edges never start anything
    let graph = ctx.coordinator.dependency_graph();
    for dependency in graph.downstream_of(run.job_name()) {
        if !dependency.should_trigger(outcome) {
            continue;
        }
        let Some(child) = ctx.engine.find_job(&dependency.downstream) else {
            continue;
        };
        if !child.is_schedulable() {
            debug!(job = child.name(), "not triggering unschedulable job");
            continue;
        }
        ctx.engine
            .schedule(&child, Cause::upstream(run.job_name(), run.id()))?;
    }

    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runner::{Script, ScriptedRunner};
    use crate::events::progress_channel;
    use crate::join::{
        ActionContext, BarrierState, EchoAction, PostJoinAction, PostJoinStep, TriggerCondition,
        TriggerConfig,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::model::{Job, JoinConfig, Outcome, Threshold};

    fn executor(jobs: Vec<Job>, runner: ScriptedRunner) -> LocalExecutor {
        let engine = Arc::new(LocalEngine::with_jobs(jobs).unwrap());
        let coordinator = Arc::new(JoinRunCoordinator::new(engine.clone()));
        LocalExecutor::new(engine, coordinator, Arc::new(runner))
    }

    fn run_count(executor: &LocalExecutor, job: &str) -> usize {
        executor.engine().runs_of(job).len()
    }

    #[tokio::test]
    async fn test_simple_diamond() {
        let executor = executor(
            vec![
                Job::new("root")
                    .triggering("a, b")
                    .with_join(JoinConfig::new("join")),
                Job::new("a"),
                Job::new("b"),
                Job::new("join"),
            ],
            ScriptedRunner::new().with_script(
                "b",
                Script {
                    outcome: Outcome::Success,
                    delay_ms: Some(10),
                },
            ),
        );

        executor.trigger("root").unwrap();
        let runs = executor.run_until_idle().await.unwrap();

        assert_eq!(runs.len(), 4);
        assert_eq!(runs.last().unwrap().job_name(), "join");
        assert_eq!(run_count(&executor, "join"), 1);

        let join = &executor.engine().runs_of("join")[0];
        assert_eq!(
            join.causes(),
            &[Cause::Join {
                job: "root".into(),
                run: 1,
                outcome: Outcome::Success
            }]
        );
    }

    #[tokio::test]
    async fn test_twenty_way_fan_out_with_one_failure_is_suppressed() {
        let names: Vec<String> = (0..20).map(|i| format!("inter{}", i)).collect();
        let mut jobs = vec![Job::new("root")
            .triggering(names.join(","))
            .with_join(JoinConfig::new("join"))];
        jobs.extend(names.iter().map(|n| Job::new(n.as_str())));
        jobs.push(Job::new("join"));

        let runner = ScriptedRunner::new()
            .with_default_delay(1)
            .with_outcome("inter13", Outcome::Failure);
        let executor = executor(jobs, runner).with_config(ExecutorConfig {
            max_parallel_runs: 4,
            default_delay_ms: 1,
        });

        executor.trigger("root").unwrap();
        let runs = executor.run_until_idle().await.unwrap();

        assert_eq!(runs.len(), 21);
        assert_eq!(run_count(&executor, "join"), 0);
        let root = &executor.engine().runs_of("root")[0];
        assert_eq!(root.barriers()[0].state(), BarrierState::Suppressed);
        assert_eq!(root.barriers()[0].aggregate(), Outcome::Failure);
    }

    /// Post-join action counting how often it ran
    struct CountingAction(Arc<AtomicUsize>);

    impl PostJoinAction for CountingAction {
        fn name(&self) -> &str {
            "count"
        }

        fn perform(&self, _ctx: &ActionContext<'_>) -> ServiceResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_twenty_way_fan_out_joins_once() {
        for _ in 0..10 {
            let count = Arc::new(AtomicUsize::new(0));
            let names: Vec<String> = (0..20).map(|i| format!("inter{}", i)).collect();
            let mut jobs = vec![Job::new("root").triggering(names.join(",")).with_join(
                JoinConfig::new("join")
                    .with_action(PostJoinStep::generic(CountingAction(count.clone()))),
            )];
            jobs.extend(names.iter().map(|n| Job::new(n.as_str())));
            jobs.push(Job::new("join"));

            // Equal delays so the branches finish on different workers at once
            let executor = executor(jobs, ScriptedRunner::new().with_default_delay(2));
            executor.trigger("root").unwrap();
            executor.run_until_idle().await.unwrap();

            assert_eq!(run_count(&executor, "join"), 1);
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_skipped_conditional_trigger_does_not_stall_outer_join() {
        let executor = executor(
            vec![
                Job::new("root")
                    .triggering("a")
                    .with_join(JoinConfig::new("g")),
                Job::new("a").triggering("b").with_join(
                    JoinConfig::new("d").with_action(PostJoinStep::Trigger(vec![
                        TriggerConfig::new("alert", TriggerCondition::Failed),
                    ])),
                ),
                Job::new("b"),
                Job::new("d"),
                Job::new("alert"),
                Job::new("g"),
            ],
            ScriptedRunner::new().with_default_delay(1),
        );

        executor.trigger("root").unwrap();
        executor.run_until_idle().await.unwrap();

        let root = &executor.engine().runs_of("root")[0];
        assert!(root.barriers()[0].pending().is_empty());
        assert_eq!(root.barriers()[0].state(), BarrierState::Fired);
        assert_eq!(run_count(&executor, "d"), 1);
        assert_eq!(run_count(&executor, "alert"), 0);
        assert_eq!(run_count(&executor, "g"), 1);
    }

    #[tokio::test]
    async fn test_unstable_threshold_accepts_unstable_branch() {
        let executor = executor(
            vec![
                Job::new("root")
                    .triggering("a, b")
                    .with_join(JoinConfig::new("join").with_threshold(Threshold::Unstable)),
                Job::new("a"),
                Job::new("b"),
                Job::new("join"),
            ],
            ScriptedRunner::new().with_outcome("b", Outcome::Unstable),
        );

        executor.trigger("root").unwrap();
        executor.run_until_idle().await.unwrap();

        let join = executor.engine().runs_of("join");
        assert_eq!(join.len(), 1);
        assert!(matches!(
            join[0].causes()[0],
            Cause::Join {
                outcome: Outcome::Unstable,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_nested_diamonds() {
        // root -> a -> {b, c}; a joins d; d -> {e, f}; root joins g
        let executor = executor(
            vec![
                Job::new("root")
                    .triggering("a")
                    .with_join(JoinConfig::new("g")),
                Job::new("a")
                    .triggering("b, c")
                    .with_join(JoinConfig::new("d")),
                Job::new("b"),
                Job::new("c"),
                Job::new("d").triggering("e, f"),
                Job::new("e"),
                Job::new("f"),
                Job::new("g"),
            ],
            ScriptedRunner::new()
                .with_default_delay(1)
                .with_script(
                    "f",
                    Script {
                        outcome: Outcome::Success,
                        delay_ms: Some(20),
                    },
                ),
        );

        executor.trigger("root").unwrap();
        let runs = executor.run_until_idle().await.unwrap();
        let order: Vec<&str> = runs.iter().map(|r| r.job_name()).collect();

        let position = |name: &str| order.iter().position(|j| *j == name).unwrap();
        assert_eq!(order.len(), 8);
        assert!(position("d") > position("b") && position("d") > position("c"));
        assert!(position("g") > position("e") && position("g") > position("f"));
        assert_eq!(run_count(&executor, "d"), 1);
        assert_eq!(run_count(&executor, "g"), 1);
    }

    #[tokio::test]
    async fn test_disabled_branch_is_not_awaited() {
        let executor = executor(
            vec![
                Job::new("root")
                    .triggering("a, b")
                    .with_join(JoinConfig::new("join")),
                Job::new("a"),
                Job::new("b"),
                Job::new("join"),
            ],
            ScriptedRunner::new(),
        );
        executor.engine().find_job("b").unwrap().set_disabled(true);

        executor.trigger("root").unwrap();
        executor.run_until_idle().await.unwrap();

        assert_eq!(run_count(&executor, "b"), 0);
        assert_eq!(run_count(&executor, "join"), 1);
    }

    #[tokio::test]
    async fn test_events_report_join_and_actions() {
        let engine = Arc::new(
            LocalEngine::with_jobs(vec![
                Job::new("root").triggering("a").with_join(
                    JoinConfig::new("join")
                        .with_action(PostJoinStep::generic(EchoAction::new("done {outcome}"))),
                ),
                Job::new("a"),
                Job::new("join"),
            ])
            .unwrap(),
        );
        let (tx, mut rx) = progress_channel();
        let coordinator =
            Arc::new(JoinRunCoordinator::new(engine.clone()).with_progress(tx.clone()));
        let executor = LocalExecutor::new(engine, coordinator, Arc::new(ScriptedRunner::new()))
            .with_progress(tx);

        executor.trigger("root").unwrap();
        executor.run_until_idle().await.unwrap();
        drop(executor);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(events
            .iter()
            .any(|e| matches!(e, JoinEvent::BarrierAttached { job, .. } if job == "root")));
        assert!(events
            .iter()
            .any(|e| matches!(e, JoinEvent::JoinScheduled { target, .. } if target == "join")));
        assert!(events
            .iter()
            .any(|e| matches!(e, JoinEvent::Log { message, .. } if message == "done SUCCESS")));
    }

    #[tokio::test]
    async fn test_unknown_job_cannot_be_triggered() {
        let executor = executor(vec![Job::new("a")], ScriptedRunner::new());
        let err = executor.trigger("missing").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
