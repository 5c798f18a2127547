// Join Run Coordinator
// Run lifecycle hooks: build and link barriers on start, notify and fire them on finish

use super::actions::{ActionContext, PostJoinStep, TriggerConfig};
use super::barrier::{BarrierState, JoinBarrier};
use super::walker::CausationWalker;
use crate::error::{ServiceError, ServiceResult};
use crate::events::{EventSender, JoinEvent, ProgressSender};
use crate::graph::{DependencyGraph, GraphAugmenter, GraphResolver, ResolverSettings};
use crate::model::{Job, Run, VirtualRun};
use crate::registry::{CausationSource, ExecutionEngine, Registry, Scheduler};

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Glue between the execution engine's run hooks and the join barriers.
///
/// `on_run_finished` may be called concurrently from worker tasks.
pub struct JoinRunCoordinator {
    runs: Arc<dyn CausationSource>,
    scheduler: Arc<dyn Scheduler>,
    resolver: GraphResolver,
    graph: RwLock<Arc<DependencyGraph>>,
    progress: Option<ProgressSender>,
}

impl JoinRunCoordinator {
    pub fn new<E: ExecutionEngine + 'static>(engine: Arc<E>) -> Self {
        Self::with_settings(engine, &ResolverSettings::default())
    }

    pub fn with_settings<E: ExecutionEngine + 'static>(
        engine: Arc<E>,
        settings: &ResolverSettings,
    ) -> Self {
        let registry: Arc<dyn Registry> = engine.clone();
        let runs: Arc<dyn CausationSource> = engine.clone();
        let coordinator = Self {
            runs,
            scheduler: engine,
            resolver: GraphResolver::with_settings(registry, settings),
            graph: RwLock::new(Arc::new(DependencyGraph::new())),
            progress: None,
        };
        coordinator.rebuild_dependency_graph();
        coordinator
    }

    /// Set progress sender for run output events
    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn resolver(&self) -> &GraphResolver {
        &self.resolver
    }

    /// Current engine dependency graph, union edges included
    pub fn dependency_graph(&self) -> Arc<DependencyGraph> {
        self.graph.read().clone()
    }

    /// Add the union edges of `job`'s join configuration to `graph`.
    /// Returns how many edges were new.
    pub fn build_dependency_graph(&self, job: &Job, graph: &mut DependencyGraph) -> usize {
        GraphAugmenter::new(&self.resolver).augment(job, graph)
    }

    /// Recompute the whole dependency graph from the registry
    pub fn rebuild_dependency_graph(&self) -> Arc<DependencyGraph> {
        let registry = self.resolver.registry();
        let jobs = registry.jobs();

        let mut graph = DependencyGraph::new();
        for job in &jobs {
            graph.add_node(job.name());
            for provider in self.resolver.providers() {
                for dependency in provider.dependencies_of(job, registry.as_ref()) {
                    graph.add_dependency(dependency);
                }
            }
        }

        let mut union_edges = 0;
        for job in &jobs {
            union_edges += self.build_dependency_graph(job, &mut graph);
        }
        debug!(
            jobs = jobs.len(),
            edges = graph.edges().len(),
            union_edges,
            "rebuilt dependency graph"
        );

        let graph = Arc::new(graph);
        *self.graph.write() = graph.clone();
        graph
    }

    /// Rewrite every join list that names `old_name`.
    ///
    /// Returns whether any configuration changed. Renaming a job that no
    /// join references is a no-op.
    pub fn on_job_renamed(&self, old_name: &str, new_name: &str) -> ServiceResult<bool> {
        if old_name.trim().is_empty() || new_name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "rename requires both the old and the new job name".to_string(),
            ));
        }

        let mut changed = false;
        for job in self.resolver.registry().jobs() {
            if job.rename_join_target(old_name, new_name) {
                info!(job = job.name(), old_name, new_name, "rewrote join list after rename");
                changed = true;
            }
        }
        if changed {
            self.rebuild_dependency_graph();
        }
        Ok(changed)
    }

    /// Hook for a run that just started.
    ///
    /// Returns the barriers attached to `run`.
    pub fn on_run_started(&self, run: &Arc<Run>) -> ServiceResult<Vec<Arc<JoinBarrier>>> {
        let job = self
            .resolver
            .registry()
            .find_job(run.job_name())
            .ok_or_else(|| ServiceError::NotFound(format!("job '{}'", run.job_name())))?;

        if run.has_upstream_cause() {
            Ok(self.start_downstream_run(run, &job).into_iter().collect())
        } else {
            let mut visited = HashMap::new();
            Ok(self.build_barrier_tree(run, &job, &job, true, &mut visited))
        }
    }

    /// Hook for a run whose outcome has been recorded.
    ///
    /// Returns the barriers this completion settled.
    pub fn on_run_finished(&self, run: &Run) -> ServiceResult<Vec<Arc<JoinBarrier>>> {
        let outcome = run.outcome().ok_or_else(|| {
            ServiceError::InvalidInput(format!("run {} has no outcome yet", run))
        })?;

        let mut settled = Vec::new();
        let walker = CausationWalker::new(self.runs.as_ref());
        for barrier in walker.barriers_visible_from(run) {
            let notification = barrier.notify(run.job_name(), outcome);
            if notification.removed {
                self.progress.send_event(JoinEvent::JobReleased {
                    barrier_job: barrier.root_job().to_string(),
                    barrier_run: barrier.root_run(),
                    job: run.job_name().to_string(),
                    remaining: notification.remaining,
                });
            }
            if notification.complete {
                self.settle(&barrier);
                settled.push(barrier);
            }
        }
        Ok(settled)
    }

    /// Barrier for a run started by an upstream run, linked into the
    /// barriers visible from it
    fn start_downstream_run(&self, run: &Arc<Run>, job: &Arc<Job>) -> Option<Arc<JoinBarrier>> {
        let config = job.join_config()?;
        if run.has_barrier_for(job.name()) {
            return None;
        }

        let upstream =
            CausationWalker::new(self.runs.as_ref()).barriers_visible_from(run);
        let barrier = Arc::new(JoinBarrier::new(
            run,
            job,
            job.name(),
            config,
            &self.resolver,
        ));
        if barrier.points_itself(&self.resolver) {
            self.discard(run, &barrier);
            return None;
        }

        self.attach(run, &barrier);
        self.widen(&barrier, &upstream);
        Some(barrier)
    }

    /// Rebuild barriers for a run started outside the job graph.
    ///
    /// Walks the upstream hierarchy of `project`. A barrier is built for each
    /// ancestor owning a join configuration that is the start job or asks to
    /// propagate. Results are memoized per project so a shared ancestor is
    /// linked from every path that reaches it.
    fn build_barrier_tree(
        &self,
        run: &Arc<Run>,
        root_job: &Arc<Job>,
        project: &Arc<Job>,
        is_root: bool,
        visited: &mut HashMap<String, Vec<Arc<JoinBarrier>>>,
    ) -> Vec<Arc<JoinBarrier>> {
        if let Some(known) = visited.get(project.name()) {
            return known.clone();
        }
        visited.insert(project.name().to_string(), Vec::new());

        let config = project.join_config();
        let mut barriers = Vec::new();
        let mut own = None;

        if let Some(config) = &config {
            if is_root || config.propagates_from_downstream() {
                let barrier = Arc::new(JoinBarrier::new(
                    run,
                    root_job,
                    project.name(),
                    config.clone(),
                    &self.resolver,
                ));
                if barrier.points_itself(&self.resolver) {
                    self.discard(run, &barrier);
                } else if run.has_barrier_for(project.name()) {
                    debug!(run = %run, owner = project.name(), "run already has this barrier");
                } else {
                    self.attach(run, &barrier);
                    barriers.push(barrier.clone());
                    own = Some(barrier);
                }
            }
        }

        let search_upstream = config
            .as_ref()
            .map_or(true, |config| config.propagates_from_downstream());
        if search_upstream {
            let graph = self.dependency_graph();
            for name in graph.upstream_names(project.name()) {
                let Some(upstream_job) = self.resolver.registry().find_job(&name) else {
                    continue;
                };
                let upstream = self.build_barrier_tree(run, root_job, &upstream_job, false, visited);
                if let Some(own) = &own {
                    self.widen(own, &upstream);
                }
                for barrier in upstream {
                    if !barriers.iter().any(|b| Arc::ptr_eq(b, &barrier)) {
                        barriers.push(barrier);
                    }
                }
            }
        }

        visited.insert(project.name().to_string(), barriers.clone());
        barriers
    }

    fn attach(&self, run: &Run, barrier: &Arc<JoinBarrier>) {
        run.attach_barrier(barrier.clone());
        debug!(barrier = %barrier, "attached barrier");
        self.progress.send_event(JoinEvent::BarrierAttached {
            job: run.job_name().to_string(),
            run: run.id(),
            pending: barrier.pending(),
            targets: barrier.targets().to_vec(),
        });
    }

    fn discard(&self, run: &Run, barrier: &JoinBarrier) {
        debug!(barrier = %barrier, "discarding barrier that waits on its own join");
        self.progress.send_event(JoinEvent::BarrierDiscarded {
            job: run.job_name().to_string(),
            run: run.id(),
            reason: format!(
                "join of '{}' is downstream of its own pending jobs",
                barrier.config_owner()
            ),
        });
    }

    fn widen(&self, barrier: &JoinBarrier, upstream: &[Arc<JoinBarrier>]) {
        for (target, added) in barrier.add_join_dependencies(upstream, &self.resolver) {
            if added.is_empty() {
                continue;
            }
            self.progress.send_event(JoinEvent::DependenciesAdded {
                job: target.root_job().to_string(),
                run: target.root_run(),
                added,
            });
        }
    }

    /// Decide a drained barrier and act on the decision
    fn settle(&self, barrier: &JoinBarrier) {
        let state = barrier.complete();
        let aggregate = barrier.aggregate();
        info!(
            job = barrier.root_job(),
            run = barrier.root_run(),
            %aggregate,
            ?state,
            "all downstream jobs complete"
        );
        self.progress.send_event(JoinEvent::BarrierCompleted {
            job: barrier.root_job().to_string(),
            run: barrier.root_run(),
            outcome: aggregate,
        });

        match state {
            BarrierState::Fired => self.fire(barrier),
            BarrierState::Suppressed => {
                self.progress.send_event(JoinEvent::ThresholdNotMet {
                    job: barrier.root_job().to_string(),
                    run: barrier.root_run(),
                    outcome: aggregate,
                    threshold: barrier.config().threshold(),
                });
            }
            BarrierState::Open | BarrierState::Ready => {
                warn!(barrier = %barrier, ?state, "barrier was not settled");
            }
        }
    }

    /// Schedule the join list, then run post-join actions in order
    fn fire(&self, barrier: &JoinBarrier) {
        let virtual_run = barrier.virtual_run();
        for target in self.resolver.join_targets(barrier.config()) {
            // Failures are already reported as events
            let _ = self.schedule_join(&virtual_run, &target);
        }

        for step in barrier.config().post_join_actions() {
            self.progress.send_event(JoinEvent::ActionStarted {
                job: virtual_run.job.clone(),
                action: step.name().to_string(),
            });

            let result = match step {
                PostJoinStep::Generic(action) => action.perform(&ActionContext {
                    run: &virtual_run,
                    progress: &self.progress,
                }),
                PostJoinStep::Trigger(configs) => self.run_trigger_step(&virtual_run, configs),
            };

            if let Err(e) = result {
                warn!(run = %virtual_run, action = step.name(), error = %e, "post-join action failed");
                self.progress
                    .send_event(JoinEvent::action_failed(&virtual_run.job, step.name(), e.to_string()));
            }
        }
    }

    fn run_trigger_step(
        &self,
        virtual_run: &VirtualRun,
        configs: &[TriggerConfig],
    ) -> ServiceResult<()> {
        let mut first_error = None;
        for config in configs {
            if !config.condition.is_met(virtual_run.outcome) {
                self.progress.send_event(JoinEvent::info(
                    format!(
                        "trigger of '{}' skipped: {:?} not met by {}",
                        config.projects, config.condition, virtual_run.outcome
                    ),
                    Some(virtual_run.job.clone()),
                ));
                continue;
            }
            for target in self.resolver.registry().resolve_names(&config.project_names()) {
                if let Err(e) = self.schedule_join(virtual_run, &target) {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(ServiceError::action_failed("trigger", e.to_string())),
            None => Ok(()),
        }
    }

    fn schedule_join(&self, virtual_run: &VirtualRun, target: &Arc<Job>) -> ServiceResult<()> {
        if !target.is_schedulable() {
            let reason = if target.is_disabled() {
                "job is disabled"
            } else {
                "job is not buildable"
            };
            info!(target = target.name(), reason, "skipping join target");
            self.progress
                .send_event(JoinEvent::join_skipped(&virtual_run.job, target.name(), reason));
            return Ok(());
        }

        match self.scheduler.schedule(target, virtual_run.as_cause()) {
            Ok(()) => {
                info!(run = %virtual_run, target = target.name(), "scheduled join target");
                self.progress.send_event(JoinEvent::JoinScheduled {
                    job: virtual_run.job.clone(),
                    target: target.name().to_string(),
                });
                Ok(())
            }
            Err(e) => {
                warn!(run = %virtual_run, target = target.name(), error = %e, "failed to schedule join target");
                self.progress.send_event(JoinEvent::error(
                    format!("failed to schedule {}: {}", target.name(), e),
                    Some(virtual_run.job.clone()),
                ));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::progress_channel;
    use crate::join::actions::{EchoAction, FailingAction, TriggerCondition};
    use crate::model::{Cause, JoinConfig, Outcome, RunId, Threshold};
    use parking_lot::Mutex;

    /// Engine double recording scheduled jobs instead of running them
    #[derive(Default)]
    struct RecordingEngine {
        jobs: Vec<Arc<Job>>,
        runs: Mutex<Vec<Arc<Run>>>,
        scheduled: Mutex<Vec<(String, Cause)>>,
    }

    impl RecordingEngine {
        fn new(jobs: Vec<Job>) -> Arc<Self> {
            Arc::new(Self {
                jobs: jobs.into_iter().map(Arc::new).collect(),
                ..Default::default()
            })
        }

        fn start(&self, job: &str, id: RunId, causes: Vec<Cause>) -> Arc<Run> {
            let run = Arc::new(Run::new(job, id, causes).unwrap());
            self.runs.lock().push(run.clone());
            run
        }

        fn scheduled(&self) -> Vec<String> {
            self.scheduled.lock().iter().map(|(j, _)| j.clone()).collect()
        }
    }

    impl Registry for RecordingEngine {
        fn find_job(&self, name: &str) -> Option<Arc<Job>> {
            self.jobs.iter().find(|j| j.name() == name).cloned()
        }

        fn jobs(&self) -> Vec<Arc<Job>> {
            self.jobs.clone()
        }
    }

    impl CausationSource for RecordingEngine {
        fn find_run(&self, job: &str, id: RunId) -> Option<Arc<Run>> {
            self.runs
                .lock()
                .iter()
                .find(|r| r.job_name() == job && r.id() == id)
                .cloned()
        }
    }

    impl Scheduler for RecordingEngine {
        fn schedule(&self, job: &Arc<Job>, cause: Cause) -> ServiceResult<()> {
            self.scheduled.lock().push((job.name().to_string(), cause));
            Ok(())
        }
    }

    fn finish(coordinator: &JoinRunCoordinator, run: &Arc<Run>, outcome: Outcome) {
        run.finish(outcome).unwrap();
        coordinator.on_run_finished(run).unwrap();
    }

    fn diamond(config: JoinConfig) -> Arc<RecordingEngine> {
        RecordingEngine::new(vec![
            Job::new("root").triggering("a, b").with_join(config),
            Job::new("a"),
            Job::new("b"),
            Job::new("join"),
        ])
    }

    /// Start and finish root, a and b in order with the given outcomes
    fn run_diamond(
        engine: &Arc<RecordingEngine>,
        coordinator: &JoinRunCoordinator,
        outcomes: [Outcome; 3],
    ) {
        let root = engine.start("root", 1, vec![Cause::manual()]);
        coordinator.on_run_started(&root).unwrap();
        let a = engine.start("a", 1, vec![Cause::upstream("root", 1)]);
        coordinator.on_run_started(&a).unwrap();
        let b = engine.start("b", 1, vec![Cause::upstream("root", 1)]);
        coordinator.on_run_started(&b).unwrap();

        finish(coordinator, &root, outcomes[0]);
        finish(coordinator, &a, outcomes[1]);
        finish(coordinator, &b, outcomes[2]);
    }

    #[test]
    fn test_simple_diamond_fires_once() {
        let engine = diamond(JoinConfig::new("join"));
        let coordinator = JoinRunCoordinator::new(engine.clone());

        run_diamond(&engine, &coordinator, [Outcome::Success; 3]);

        let scheduled = engine.scheduled.lock().clone();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].0, "join");
        assert_eq!(
            scheduled[0].1,
            Cause::Join {
                job: "root".into(),
                run: 1,
                outcome: Outcome::Success
            }
        );
    }

    #[test]
    fn test_failure_suppresses_join() {
        let engine = diamond(JoinConfig::new("join"));
        let (tx, mut rx) = progress_channel();
        let coordinator = JoinRunCoordinator::new(engine.clone()).with_progress(tx);

        run_diamond(
            &engine,
            &coordinator,
            [Outcome::Success, Outcome::Failure, Outcome::Success],
        );

        assert!(engine.scheduled().is_empty());
        let mut suppressed = false;
        while let Ok(event) = rx.try_recv() {
            if let JoinEvent::ThresholdNotMet { outcome, .. } = event {
                assert_eq!(outcome, Outcome::Failure);
                suppressed = true;
            }
        }
        assert!(suppressed);
    }

    #[test]
    fn test_unstable_threshold_fires_with_unstable_cause() {
        let engine = diamond(JoinConfig::new("join").with_threshold(Threshold::Unstable));
        let coordinator = JoinRunCoordinator::new(engine.clone());

        run_diamond(
            &engine,
            &coordinator,
            [Outcome::Success, Outcome::Success, Outcome::Unstable],
        );

        let scheduled = engine.scheduled.lock().clone();
        assert_eq!(scheduled.len(), 1);
        assert!(matches!(
            scheduled[0].1,
            Cause::Join {
                outcome: Outcome::Unstable,
                ..
            }
        ));
    }

    #[test]
    fn test_disabled_target_is_skipped() {
        let engine = RecordingEngine::new(vec![
            Job::new("root")
                .triggering("a")
                .with_join(JoinConfig::new("join, other")),
            Job::new("a"),
            Job::new("join"),
            Job::new("other"),
        ]);
        engine.find_job("join").unwrap().set_disabled(true);
        let (tx, mut rx) = progress_channel();
        let coordinator = JoinRunCoordinator::new(engine.clone()).with_progress(tx);

        let root = engine.start("root", 1, vec![Cause::manual()]);
        coordinator.on_run_started(&root).unwrap();
        let a = engine.start("a", 1, vec![Cause::upstream("root", 1)]);
        coordinator.on_run_started(&a).unwrap();
        finish(&coordinator, &root, Outcome::Success);
        finish(&coordinator, &a, Outcome::Success);

        assert_eq!(engine.scheduled(), vec!["other"]);
        let skipped = std::iter::from_fn(|| rx.try_recv().ok())
            .any(|e| matches!(e, JoinEvent::JoinSkipped { ref target, .. } if target == "join"));
        assert!(skipped);
    }

    #[test]
    fn test_post_join_actions_run_in_order_and_failures_are_captured() {
        let config = JoinConfig::new("join")
            .with_action(PostJoinStep::generic(FailingAction::new("boom")))
            .with_action(PostJoinStep::generic(EchoAction::new("joined {outcome}")))
            .with_action(PostJoinStep::Trigger(vec![
                TriggerConfig::new("deploy", TriggerCondition::Success),
                TriggerConfig::new("alert", TriggerCondition::Failed),
            ]));
        let engine = RecordingEngine::new(vec![
            Job::new("root").triggering("a").with_join(config),
            Job::new("a"),
            Job::new("join"),
            Job::new("deploy"),
            Job::new("alert"),
        ]);
        let (tx, mut rx) = progress_channel();
        let coordinator = JoinRunCoordinator::new(engine.clone()).with_progress(tx);

        let root = engine.start("root", 1, vec![Cause::manual()]);
        coordinator.on_run_started(&root).unwrap();
        let a = engine.start("a", 1, vec![Cause::upstream("root", 1)]);
        coordinator.on_run_started(&a).unwrap();
        finish(&coordinator, &root, Outcome::Success);
        finish(&coordinator, &a, Outcome::Success);

        assert_eq!(engine.scheduled(), vec!["join", "deploy"]);

        let events: Vec<JoinEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let failed = events
            .iter()
            .position(|e| matches!(e, JoinEvent::ActionFailed { action, .. } if action == "fail"))
            .unwrap();
        let echoed = events
            .iter()
            .position(|e| matches!(e, JoinEvent::Log { message, .. } if message == "joined SUCCESS"))
            .unwrap();
        assert!(failed < echoed);
    }

    #[test]
    fn test_self_pointing_barrier_is_discarded() {
        let engine = RecordingEngine::new(vec![
            Job::new("root")
                .triggering("a, b")
                .with_join(JoinConfig::new("join")),
            Job::new("a"),
            Job::new("b"),
            Job::new("join").triggering("b"),
        ]);
        let coordinator = JoinRunCoordinator::new(engine.clone());

        let root = engine.start("root", 1, vec![Cause::manual()]);
        assert!(coordinator.on_run_started(&root).unwrap().is_empty());
        assert!(root.barriers().is_empty());
    }

    #[test]
    fn test_nested_diamond_joins_in_order() {
        // root -> a -> {b, c}; a joins d; d -> {e, f}; root joins g
        let engine = RecordingEngine::new(vec![
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
        ]);
        let coordinator = JoinRunCoordinator::new(engine.clone());

        let root = engine.start("root", 1, vec![Cause::manual()]);
        coordinator.on_run_started(&root).unwrap();
        let a = engine.start("a", 1, vec![Cause::upstream("root", 1)]);
        assert_eq!(coordinator.on_run_started(&a).unwrap().len(), 1);

        let root_barrier = root.barriers()[0].clone();
        assert_eq!(
            root_barrier.pending(),
            vec!["a", "b", "c", "d", "e", "f", "root"]
        );

        let b = engine.start("b", 1, vec![Cause::upstream("a", 1)]);
        coordinator.on_run_started(&b).unwrap();
        let c = engine.start("c", 1, vec![Cause::upstream("a", 1)]);
        coordinator.on_run_started(&c).unwrap();
        for run in [&root, &a, &b, &c] {
            finish(&coordinator, run, Outcome::Success);
        }
        assert_eq!(engine.scheduled(), vec!["d"]);

        let d = engine.start(
            "d",
            1,
            vec![Cause::Join {
                job: "a".into(),
                run: 1,
                outcome: Outcome::Success,
            }],
        );
        coordinator.on_run_started(&d).unwrap();
        finish(&coordinator, &d, Outcome::Success);
        let e = engine.start("e", 1, vec![Cause::upstream("d", 1)]);
        finish(&coordinator, &e, Outcome::Success);
        assert_eq!(engine.scheduled(), vec!["d"]);

        let f = engine.start("f", 1, vec![Cause::upstream("d", 1)]);
        finish(&coordinator, &f, Outcome::Unstable);
        assert_eq!(engine.scheduled(), vec!["d"]);
        assert_eq!(root_barrier.state(), BarrierState::Suppressed);
    }

    #[test]
    fn test_manual_start_on_intermediate_propagates() {
        // Starting a directly still joins root's g when both propagate
        let engine = RecordingEngine::new(vec![
            Job::new("root")
                .triggering("a")
                .with_join(JoinConfig::new("g").with_propagation(true)),
            Job::new("a")
                .triggering("b")
                .with_join(JoinConfig::new("d").with_propagation(true)),
            Job::new("b"),
            Job::new("d"),
            Job::new("g"),
        ]);
        let coordinator = JoinRunCoordinator::new(engine.clone());

        let a = engine.start("a", 1, vec![Cause::manual()]);
        let barriers = coordinator.on_run_started(&a).unwrap();
        assert_eq!(barriers.len(), 2);

        let owners: Vec<&str> = barriers.iter().map(|b| b.config_owner()).collect();
        assert_eq!(owners, vec!["a", "root"]);
        // root's barrier waits for a's join
        assert!(barriers[1].is_pending("d"));

        let b = engine.start("b", 1, vec![Cause::upstream("a", 1)]);
        finish(&coordinator, &a, Outcome::Success);
        finish(&coordinator, &b, Outcome::Success);
        assert_eq!(engine.scheduled(), vec!["d"]);

        let d = engine.start(
            "d",
            1,
            vec![Cause::Join {
                job: "a".into(),
                run: 1,
                outcome: Outcome::Success,
            }],
        );
        finish(&coordinator, &d, Outcome::Success);
        assert_eq!(engine.scheduled(), vec!["d", "g"]);
    }

    #[test]
    fn test_manual_start_without_propagation_ignores_upstream_join() {
        let engine = RecordingEngine::new(vec![
            Job::new("root")
                .triggering("a")
                .with_join(JoinConfig::new("g")),
            Job::new("a").triggering("b"),
            Job::new("b"),
            Job::new("g"),
        ]);
        let coordinator = JoinRunCoordinator::new(engine.clone());

        let a = engine.start("a", 1, vec![Cause::manual()]);
        assert!(coordinator.on_run_started(&a).unwrap().is_empty());
    }

    #[test]
    fn test_dependency_graph_contains_union_edges() {
        let engine = diamond(JoinConfig::new("join"));
        let coordinator = JoinRunCoordinator::new(engine);

        let graph = coordinator.dependency_graph();
        assert_eq!(graph.union_edges().count(), 3);
        assert_eq!(graph.upstream_names("join"), vec!["a", "b", "root"]);
        assert!(graph
            .downstream_of("a")
            .iter()
            .all(|edge| !edge.should_trigger(Outcome::Success)));
    }

    #[test]
    fn test_rename_rewrites_join_lists() {
        let engine = diamond(JoinConfig::new("join"));
        let coordinator = JoinRunCoordinator::new(engine.clone());

        assert!(coordinator.on_job_renamed("join", "merge").unwrap());
        assert_eq!(
            engine
                .find_job("root")
                .unwrap()
                .join_config()
                .unwrap()
                .join_projects(),
            "merge"
        );
        assert!(!coordinator.on_job_renamed("join", "merge").unwrap());
        assert!(!coordinator.on_job_renamed("absent", "x").unwrap());

        let err = coordinator.on_job_renamed("", "x").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_finish_requires_outcome() {
        let engine = diamond(JoinConfig::new("join"));
        let coordinator = JoinRunCoordinator::new(engine.clone());
        let root = engine.start("root", 1, vec![Cause::manual()]);

        assert!(coordinator.on_run_finished(&root).is_err());
    }
}
