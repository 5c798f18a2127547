// Local Engine
// In-process job registry, run store and scheduling queue

use crate::error::{ServiceError, ServiceResult};
use crate::model::{Cause, Job, Run, RunId};
use crate::registry::{CausationSource, Registry, Scheduler};

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// A queued request to start a job
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub job: Arc<Job>,
    /// All causes merged while the request waited in the queue
    pub causes: Vec<Cause>,
}

/// Registry, run store and queue backing the local executor.
///
/// Requests for a job that is already queued are merged into the queued
/// request, so a job reached through several upstream runs starts once with
/// all of their causes.
#[derive(Debug, Default)]
pub struct LocalEngine {
    jobs: RwLock<Vec<Arc<Job>>>,
    runs: RwLock<HashMap<(String, RunId), Arc<Run>>>,
    next_ids: Mutex<HashMap<String, RunId>>,
    queue: Mutex<VecDeque<ScheduleRequest>>,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine holding the given jobs. Names must be unique.
    pub fn with_jobs(jobs: Vec<Job>) -> ServiceResult<Self> {
        let engine = Self::new();
        for job in jobs {
            engine.add_job(job)?;
        }
        Ok(engine)
    }

    pub fn add_job(&self, job: Job) -> ServiceResult<Arc<Job>> {
        if job.name().trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "job name must not be empty".to_string(),
            ));
        }

        let mut jobs = self.jobs.write();
        if jobs.iter().any(|j| j.name() == job.name()) {
            return Err(ServiceError::InvalidInput(format!(
                "duplicate job name '{}'",
                job.name()
            )));
        }
        let job = Arc::new(job);
        jobs.push(job.clone());
        Ok(job)
    }

    /// Create and store the next run of `job`
    pub fn create_run(&self, job: &Job, causes: Vec<Cause>) -> ServiceResult<Arc<Run>> {
        let id = {
            let mut ids = self.next_ids.lock();
            let next = ids.entry(job.name().to_string()).or_insert(0);
            *next += 1;
            *next
        };
        let run = Arc::new(Run::new(job.name(), id, causes)?);
        self.runs
            .write()
            .insert((job.name().to_string(), id), run.clone());
        Ok(run)
    }

    /// Drain every queued request in arrival order
    pub fn take_queued(&self) -> Vec<ScheduleRequest> {
        self.queue.lock().drain(..).collect()
    }

    /// All runs of a job, oldest first
    pub fn runs_of(&self, job: &str) -> Vec<Arc<Run>> {
        let mut runs: Vec<Arc<Run>> = self
            .runs
            .read()
            .values()
            .filter(|r| r.job_name() == job)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.id());
        runs
    }
}

impl Registry for LocalEngine {
    fn find_job(&self, name: &str) -> Option<Arc<Job>> {
        self.jobs.read().iter().find(|j| j.name() == name).cloned()
    }

    fn jobs(&self) -> Vec<Arc<Job>> {
        self.jobs.read().clone()
    }
}

impl CausationSource for LocalEngine {
    fn find_run(&self, job: &str, id: RunId) -> Option<Arc<Run>> {
        self.runs.read().get(&(job.to_string(), id)).cloned()
    }
}

impl Scheduler for LocalEngine {
    fn schedule(&self, job: &Arc<Job>, cause: Cause) -> ServiceResult<()> {
        if job.is_disabled() {
            return Err(ServiceError::Disabled(job.name().to_string()));
        }
        if !job.is_buildable() {
            return Err(ServiceError::SchedulingFailed(format!(
                "job '{}' is not buildable",
                job.name()
            )));
        }

        let mut queue = self.queue.lock();
        if let Some(queued) = queue.iter_mut().find(|r| r.job.name() == job.name()) {
            debug!(job = job.name(), %cause, "merged cause into queued request");
            if !queued.causes.contains(&cause) {
                queued.causes.push(cause);
            }
            return Ok(());
        }

        debug!(job = job.name(), %cause, "queued job");
        queue.push_back(ScheduleRequest {
            job: job.clone(),
            causes: vec![cause],
        });
        Ok(())
    }
}
