// Join Barrier
// Fan-in state for one occurrence of a split: pending jobs, aggregate outcome, one-shot completion

use crate::graph::GraphResolver;
use crate::model::{to_name_list, Cause, Job, JoinConfig, Outcome, Run, RunId, VirtualRun};

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::debug;

const OPEN: u8 = 0;
const READY: u8 = 1;
const FIRED: u8 = 2;
const SUPPRESSED: u8 = 3;

/// Lifecycle of a barrier: `Open -> Ready -> Fired | Suppressed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    /// Still waiting for pending jobs
    Open,
    /// Pending set drained; the completing caller is deciding
    Ready,
    /// Join targets were scheduled and post-join actions ran
    Fired,
    /// Aggregate outcome was worse than the threshold
    Suppressed,
}

impl BarrierState {
    fn from_u8(value: u8) -> Self {
        match value {
            OPEN => BarrierState::Open,
            READY => BarrierState::Ready,
            FIRED => BarrierState::Fired,
            _ => BarrierState::Suppressed,
        }
    }
}

/// Result of reporting a finished job to a barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    /// The job was pending and has been removed
    pub removed: bool,
    /// This caller won the transition out of `Open` and must complete the barrier
    pub complete: bool,
    /// Pending jobs left after this notification
    pub remaining: usize,
}

#[derive(Debug)]
struct Pending {
    jobs: BTreeSet<String>,
    aggregate: Outcome,
}

/// Fan-in barrier attached to a root run.
///
/// The pending set and aggregate share one lock. The transition out of
/// `Open` is a compare-and-set taken under that lock, so a job can never be
/// added to a barrier that has already drained and exactly one notifier
/// observes `complete`.
#[derive(Debug)]
pub struct JoinBarrier {
    root_job: String,
    root_run: RunId,
    root_causes: Vec<Cause>,
    /// Job whose join configuration spawned this barrier
    owner: String,
    config: Arc<JoinConfig>,
    targets: Vec<String>,
    pending: Mutex<Pending>,
    phase: AtomicU8,
}

impl JoinBarrier {
    /// Barrier over `run`'s job and its full downstream closure.
    ///
    /// Disabled and non-buildable jobs are left out of the pending set.
    pub fn new(
        run: &Run,
        root_job: &Job,
        owner: impl Into<String>,
        config: Arc<JoinConfig>,
        resolver: &GraphResolver,
    ) -> Self {
        let mut jobs: BTreeSet<String> = resolver
            .downstream_closure(root_job, false, false)
            .iter()
            .filter(|job| job.is_schedulable())
            .map(|job| job.name().to_string())
            .collect();
        if root_job.is_schedulable() {
            jobs.insert(root_job.name().to_string());
        }

        let targets = resolver
            .all_join_targets(&config)
            .iter()
            .map(|job| job.name().to_string())
            .collect();

        Self {
            root_job: run.job_name().to_string(),
            root_run: run.id(),
            root_causes: run.causes().to_vec(),
            owner: owner.into(),
            config,
            targets,
            pending: Mutex::new(Pending {
                jobs,
                aggregate: Outcome::Success,
            }),
            phase: AtomicU8::new(OPEN),
        }
    }

    pub fn root_job(&self) -> &str {
        &self.root_job
    }

    pub fn root_run(&self) -> RunId {
        self.root_run
    }

    pub fn config_owner(&self) -> &str {
        &self.owner
    }

    pub fn config(&self) -> &Arc<JoinConfig> {
        &self.config
    }

    /// Join targets, trigger-action projects included
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Snapshot of the pending set, sorted by name
    pub fn pending(&self) -> Vec<String> {
        self.pending.lock().jobs.iter().cloned().collect()
    }

    pub fn is_pending(&self, job: &str) -> bool {
        self.pending.lock().jobs.contains(job)
    }

    pub fn aggregate(&self) -> Outcome {
        self.pending.lock().aggregate
    }

    pub fn state(&self) -> BarrierState {
        BarrierState::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// True once the barrier left `Open`
    pub fn is_completed(&self) -> bool {
        self.phase.load(Ordering::Acquire) != OPEN
    }

    /// Whether a pending job lies downstream of one of the join targets.
    ///
    /// Such a barrier would wait on a job that only runs after the join
    /// fires, so it can never complete.
    pub fn points_itself(&self, resolver: &GraphResolver) -> bool {
        let pending = self.pending.lock().jobs.clone();
        resolver.all_join_targets(&self.config).iter().any(|target| {
            resolver
                .closure_names(target, false, true)
                .iter()
                .any(|name| pending.contains(name))
        })
    }

    /// Union-merge jobs into the pending set.
    ///
    /// Unschedulable jobs are skipped and nothing is added once the barrier
    /// has drained. Returns the names that were actually new.
    pub fn add_pending_dependencies(&self, jobs: &[Arc<Job>]) -> Vec<String> {
        let mut pending = self.pending.lock();
        if self.phase.load(Ordering::Acquire) != OPEN {
            return Vec::new();
        }

        let mut added = Vec::new();
        for job in jobs {
            if job.is_schedulable() && pending.jobs.insert(job.name().to_string()) {
                added.push(job.name().to_string());
            }
        }
        if !added.is_empty() {
            debug!(barrier = %self.label(), added = ?added, "barrier has new pending jobs");
        }
        added
    }

    /// Widen each upstream barrier with this barrier's plain join targets and
    /// everything they trigger.
    ///
    /// Trigger-step projects are conditional and never widen an upstream
    /// barrier. Returns the jobs added per upstream barrier.
    pub fn add_join_dependencies(
        &self,
        upstream: &[Arc<JoinBarrier>],
        resolver: &GraphResolver,
    ) -> Vec<(Arc<JoinBarrier>, Vec<String>)> {
        if upstream.is_empty() {
            return Vec::new();
        }

        let nested = resolver.join_target_hierarchy(&self.config);

        upstream
            .iter()
            .map(|barrier| {
                debug!(
                    barrier = %barrier.label(),
                    nested = %self.label(),
                    "upstream barrier now waits on nested join"
                );
                (barrier.clone(), barrier.add_pending_dependencies(&nested))
            })
            .collect()
    }

    /// Report a finished job.
    ///
    /// Linearizable with respect to other notifications and to widening.
    pub fn notify(&self, job: &str, outcome: Outcome) -> Notification {
        let mut pending = self.pending.lock();
        let removed = pending.jobs.remove(job);
        if removed {
            pending.aggregate = pending.aggregate.combine(outcome);
            debug!(
                barrier = %self.label(),
                job,
                %outcome,
                remaining = pending.jobs.len(),
                "released job from barrier"
            );
        }

        let complete = pending.jobs.is_empty()
            && self
                .phase
                .compare_exchange(OPEN, READY, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();

        Notification {
            removed,
            complete,
            remaining: pending.jobs.len(),
        }
    }

    /// Settle a `Ready` barrier against its threshold.
    ///
    /// Only the caller that observed `complete` from [`JoinBarrier::notify`]
    /// should call this; any other call returns the current state unchanged.
    pub fn complete(&self) -> BarrierState {
        let aggregate = self.aggregate();
        let next = if self.config.threshold().is_met_by(aggregate) {
            FIRED
        } else {
            SUPPRESSED
        };
        match self
            .phase
            .compare_exchange(READY, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => BarrierState::from_u8(next),
            Err(current) => BarrierState::from_u8(current),
        }
    }

    /// The root run as seen by join targets, carrying the aggregate outcome
    pub fn virtual_run(&self) -> VirtualRun {
        VirtualRun {
            job: self.root_job.clone(),
            id: self.root_run,
            outcome: self.aggregate(),
            causes: self.root_causes.clone(),
        }
    }

    fn label(&self) -> String {
        format!("{}#{}", self.root_job, self.root_run)
    }
}

impl fmt::Display for JoinBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "join barrier on build [{}] waits for [{}] before starting [{}]",
            self.label(),
            to_name_list(&self.pending()),
            to_name_list(&self.targets)
        )
    }
}
