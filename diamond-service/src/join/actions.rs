// Post-join actions
// Steps a fired barrier runs after scheduling its join targets

use crate::error::{ServiceError, ServiceResult};
use crate::events::{EventSender, JoinEvent, ProgressSender};
use crate::model::{parse_name_list, Outcome, VirtualRun};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What an action sees when it runs
pub struct ActionContext<'a> {
    /// The root run, reporting the barrier's aggregate outcome
    pub run: &'a VirtualRun,
    pub progress: &'a Option<ProgressSender>,
}

impl ActionContext<'_> {
    /// Write a line to the root run's output
    pub fn log(&self, message: impl Into<String>) {
        self.progress
            .send_event(JoinEvent::info(message, Some(self.run.job.clone())));
    }
}

/// A custom step run after a join fires
pub trait PostJoinAction: Send + Sync {
    fn name(&self) -> &str;

    fn perform(&self, ctx: &ActionContext<'_>) -> ServiceResult<()>;
}

/// When a trigger-config step starts its projects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCondition {
    Always,
    #[default]
    Success,
    UnstableOrBetter,
    UnstableOrWorse,
    Failed,
}

impl TriggerCondition {
    pub fn is_met(self, outcome: Outcome) -> bool {
        match self {
            TriggerCondition::Always => true,
            TriggerCondition::Success => outcome == Outcome::Success,
            TriggerCondition::UnstableOrBetter => outcome <= Outcome::Unstable,
            TriggerCondition::UnstableOrWorse => outcome >= Outcome::Unstable,
            TriggerCondition::Failed => outcome == Outcome::Failure,
        }
    }
}

/// Projects to start from a trigger step, and the condition on the aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub projects: String,
    #[serde(default)]
    pub condition: TriggerCondition,
}

impl TriggerConfig {
    pub fn new(projects: impl Into<String>, condition: TriggerCondition) -> Self {
        Self {
            projects: projects.into(),
            condition,
        }
    }

    pub fn project_names(&self) -> Vec<String> {
        parse_name_list(&self.projects)
    }
}

/// One entry of a join's post-join action list
#[derive(Clone)]
pub enum PostJoinStep {
    /// Arbitrary action, invoked with the virtual root run
    Generic(Arc<dyn PostJoinAction>),
    /// Start further projects, each config gated by its own condition
    Trigger(Vec<TriggerConfig>),
}

impl PostJoinStep {
    pub fn generic<A: PostJoinAction + 'static>(action: A) -> Self {
        PostJoinStep::Generic(Arc::new(action))
    }

    pub fn name(&self) -> &str {
        match self {
            PostJoinStep::Generic(action) => action.name(),
            PostJoinStep::Trigger(_) => "trigger",
        }
    }
}

impl fmt::Debug for PostJoinStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostJoinStep::Generic(action) => {
                f.debug_tuple("Generic").field(&action.name()).finish()
            }
            PostJoinStep::Trigger(configs) => f.debug_tuple("Trigger").field(configs).finish(),
        }
    }
}

/// Writes a message to the run output.
///
/// `{job}`, `{run}` and `{outcome}` are replaced from the virtual root run.
#[derive(Debug, Clone)]
pub struct EchoAction {
    message: String,
}

impl EchoAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn render(&self, run: &VirtualRun) -> String {
        self.message
            .replace("{job}", &run.job)
            .replace("{run}", &run.id.to_string())
            .replace("{outcome}", &run.outcome.to_string())
    }
}

impl PostJoinAction for EchoAction {
    fn name(&self) -> &str {
        "echo"
    }

    fn perform(&self, ctx: &ActionContext<'_>) -> ServiceResult<()> {
        ctx.log(self.render(ctx.run));
        Ok(())
    }
}

/// Always fails with the configured message
#[derive(Debug, Clone)]
pub struct FailingAction {
    message: String,
}

impl FailingAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl PostJoinAction for FailingAction {
    fn name(&self) -> &str {
        "fail"
    }

    fn perform(&self, _ctx: &ActionContext<'_>) -> ServiceResult<()> {
        Err(ServiceError::action_failed(self.name(), self.message.clone()))
    }
}
