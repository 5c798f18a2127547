// Run model
// One execution of a job, its causation records and the barriers attached to it

use super::outcome::Outcome;
use crate::error::{ServiceError, ServiceResult};
use crate::join::barrier::JoinBarrier;

use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Sequence number of a run, unique per job
pub type RunId = u64;

/// Why a run was started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause {
    /// Started by a user or any trigger outside the job graph
    Manual { user: Option<String> },
    /// Started by a finished upstream run
    Upstream { job: String, run: RunId },
    /// Started by a fired join barrier, on behalf of the barrier's root run
    Join {
        job: String,
        run: RunId,
        outcome: Outcome,
    },
}

impl Cause {
    pub fn manual() -> Self {
        Cause::Manual { user: None }
    }

    pub fn upstream(job: impl Into<String>, run: RunId) -> Self {
        Cause::Upstream {
            job: job.into(),
            run,
        }
    }

    /// The upstream run this cause points to, if any
    pub fn upstream_run(&self) -> Option<(&str, RunId)> {
        match self {
            Cause::Manual { .. } => None,
            Cause::Upstream { job, run } | Cause::Join { job, run, .. } => Some((job, *run)),
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Manual { user: Some(user) } => write!(f, "started by {}", user),
            Cause::Manual { user: None } => f.write_str("started manually"),
            Cause::Upstream { job, run } => write!(f, "started by upstream {}#{}", job, run),
            Cause::Join { job, run, outcome } => {
                write!(f, "started by join of {}#{} ({})", job, run, outcome)
            }
        }
    }
}

/// One execution of a job.
///
/// Owned by the execution engine. The outcome is written once at finish;
/// barriers are attached while the run starts and live as long as the run.
#[derive(Debug)]
pub struct Run {
    job: String,
    id: RunId,
    causes: Vec<Cause>,
    outcome: OnceLock<Outcome>,
    barriers: RwLock<Vec<Arc<JoinBarrier>>>,
}

impl Run {
    pub fn new(job: impl Into<String>, id: RunId, causes: Vec<Cause>) -> ServiceResult<Self> {
        let job = job.into();
        if job.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "run requires a job name".to_string(),
            ));
        }
        Ok(Self {
            job,
            id,
            causes,
            outcome: OnceLock::new(),
            barriers: RwLock::new(Vec::new()),
        })
    }

    pub fn job_name(&self) -> &str {
        &self.job
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn causes(&self) -> &[Cause] {
        &self.causes
    }

    /// True when any cause points at an upstream run
    pub fn has_upstream_cause(&self) -> bool {
        self.causes.iter().any(|c| c.upstream_run().is_some())
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome.get().copied()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Record the final outcome. Fails if the run already finished.
    pub fn finish(&self, outcome: Outcome) -> ServiceResult<()> {
        self.outcome.set(outcome).map_err(|_| {
            ServiceError::InvalidInput(format!("run {} already finished", self))
        })
    }

    pub fn attach_barrier(&self, barrier: Arc<JoinBarrier>) {
        self.barriers.write().push(barrier);
    }

    /// Snapshot of attached barriers
    pub fn barriers(&self) -> Vec<Arc<JoinBarrier>> {
        self.barriers.read().clone()
    }

    /// Whether a barrier spawned by `config_owner`'s join config is already attached
    pub fn has_barrier_for(&self, config_owner: &str) -> bool {
        self.barriers
            .read()
            .iter()
            .any(|b| b.config_owner() == config_owner)
    }
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.job, self.id)
    }
}

/// Stand-in for a root run, reporting a barrier's aggregate outcome.
///
/// Join targets and post-join actions see this instead of any single
/// branch's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualRun {
    pub job: String,
    pub id: RunId,
    pub outcome: Outcome,
    pub causes: Vec<Cause>,
}

impl VirtualRun {
    /// Cause for runs scheduled on behalf of this virtual run
    pub fn as_cause(&self) -> Cause {
        Cause::Join {
            job: self.job.clone(),
            run: self.id,
            outcome: self.outcome,
        }
    }
}

impl fmt::Display for VirtualRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} [{}]", self.job, self.id, self.outcome)
    }
}
