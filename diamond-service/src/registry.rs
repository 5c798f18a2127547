// Engine capabilities
// What the join engine needs from the execution engine that owns jobs and runs

use crate::error::ServiceResult;
use crate::model::{Cause, Job, Run, RunId};

use std::sync::Arc;

/// Job lookup
pub trait Registry: Send + Sync {
    /// Find a job by its unique name
    fn find_job(&self, name: &str) -> Option<Arc<Job>>;

    /// All registered jobs
    fn jobs(&self) -> Vec<Arc<Job>>;

    /// Resolve a comma-separated name list, silently skipping unknown names
    fn resolve_names(&self, names: &[String]) -> Vec<Arc<Job>> {
        names.iter().filter_map(|n| self.find_job(n)).collect()
    }
}

/// Run lookup for walking causation chains
pub trait CausationSource: Send + Sync {
    fn find_run(&self, job: &str, id: RunId) -> Option<Arc<Run>>;
}

/// Hands new runs to the execution engine.
///
/// Scheduling is fire-and-forget: implementations queue the request and
/// return without waiting for the run to start.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, job: &Arc<Job>, cause: Cause) -> ServiceResult<()>;
}

/// Everything the coordinator consumes from an execution engine
pub trait ExecutionEngine: Registry + CausationSource + Scheduler {}

impl<T: Registry + CausationSource + Scheduler> ExecutionEngine for T {}
