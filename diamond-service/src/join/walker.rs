// Causation Walker
// Collects the live barriers a run can see through its upstream causes

use super::barrier::JoinBarrier;
use crate::model::{Run, RunId};
use crate::registry::CausationSource;

use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

pub struct CausationWalker<'a> {
    source: &'a dyn CausationSource,
}

impl<'a> CausationWalker<'a> {
    pub fn new(source: &'a dyn CausationSource) -> Self {
        Self { source }
    }

    /// Barriers on `run` and on every run upstream of it that have not
    /// completed yet, ancestors first. Each barrier appears once.
    pub fn barriers_visible_from(&self, run: &Run) -> Vec<Arc<JoinBarrier>> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.walk(run, &mut visited, &mut out);
        trace!(run = %run, count = out.len(), "collected visible barriers");
        out
    }

    fn walk(
        &self,
        run: &Run,
        visited: &mut HashSet<(String, RunId)>,
        out: &mut Vec<Arc<JoinBarrier>>,
    ) {
        if !visited.insert((run.job_name().to_string(), run.id())) {
            return;
        }

        for cause in run.causes() {
            let Some((job, id)) = cause.upstream_run() else {
                continue;
            };
            match self.source.find_run(job, id) {
                Some(upstream) => self.walk(&upstream, visited, out),
                None => trace!(job, id, "upstream run no longer available"),
            }
        }

        for barrier in run.barriers() {
            if barrier.is_completed() {
                continue;
            }
            if !out.iter().any(|seen| Arc::ptr_eq(seen, &barrier)) {
                out.push(barrier);
            }
        }
    }
}
