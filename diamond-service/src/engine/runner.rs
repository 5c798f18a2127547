// Job Runners
// What actually happens when the local executor runs a job

use crate::model::{Job, Outcome, Run};

use std::collections::HashMap;
use std::time::Duration;

/// Trait for job runners
#[async_trait::async_trait]
pub trait JobRunner: Send + Sync {
    /// Execute one run and report its outcome
    async fn run(&self, job: &Job, run: &Run) -> Outcome;
}

/// Scripted behaviour of one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Script {
    pub outcome: Outcome,
    /// Overrides the runner's default delay
    pub delay_ms: Option<u64>,
}

/// Runner that sleeps and then reports a configured outcome.
///
/// Jobs without a script succeed after the default delay.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    scripts: HashMap<String, Script>,
    default_delay_ms: u64,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_delay(mut self, delay_ms: u64) -> Self {
        self.default_delay_ms = delay_ms;
        self
    }

    pub fn with_script(mut self, job: impl Into<String>, script: Script) -> Self {
        self.scripts.insert(job.into(), script);
        self
    }

    /// Shorthand for a script with the default delay
    pub fn with_outcome(self, job: impl Into<String>, outcome: Outcome) -> Self {
        self.with_script(
            job,
            Script {
                outcome,
                delay_ms: None,
            },
        )
    }

    pub fn script_for(&self, job: &str) -> Script {
        self.scripts.get(job).copied().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl JobRunner for ScriptedRunner {
    async fn run(&self, job: &Job, _run: &Run) -> Outcome {
        let script = self.script_for(job.name());
        let delay = script.delay_ms.unwrap_or(self.default_delay_ms);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        script.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cause;

    #[tokio::test]
    async fn test_scripted_outcomes() {
        let runner = ScriptedRunner::new()
            .with_outcome("flaky", Outcome::Unstable)
            .with_script(
                "slow",
                Script {
                    outcome: Outcome::Failure,
                    delay_ms: Some(5),
                },
            );
        let run = Run::new("flaky", 1, vec![Cause::manual()]).unwrap();

        assert_eq!(runner.run(&Job::new("flaky"), &run).await, Outcome::Unstable);
        assert_eq!(runner.run(&Job::new("slow"), &run).await, Outcome::Failure);
        assert_eq!(runner.run(&Job::new("other"), &run).await, Outcome::Success);
    }
}
