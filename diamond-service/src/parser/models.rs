// Topology Data Models
// YAML schema for a job topology: settings, jobs, triggers, joins and scripted results

use crate::engine::{ExecutorConfig, Script};
use crate::graph::ResolverSettings;
use crate::join::{EchoAction, FailingAction, PostJoinStep, TriggerConfig};
use crate::model::{DownstreamTrigger, Job, JoinConfig, Outcome, Threshold, TriggerKind};

use serde::{Deserialize, Serialize};

/// Root topology file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    /// Engine-wide settings
    #[serde(default)]
    pub settings: Settings,

    /// Every job known to the engine
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

/// Resolver and executor settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub resolver: ResolverSettings,

    #[serde(flatten)]
    pub executor: ExecutorConfig,
}

fn default_true() -> bool {
    true
}

/// One job of the topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,

    #[serde(default)]
    pub disabled: bool,

    #[serde(default = "default_true")]
    pub buildable: bool,

    /// Downstream triggers, one entry per relationship declaration
    #[serde(default)]
    pub triggers: Vec<TriggerDefinition>,

    /// Join configuration if this job is a split
    #[serde(default)]
    pub join: Option<JoinDefinition>,

    /// Outcome the local runner reports for this job
    #[serde(default)]
    pub outcome: Outcome,

    /// Simulated run time in milliseconds
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

/// A downstream trigger declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDefinition {
    #[serde(default)]
    pub kind: TriggerKind,

    /// Comma-separated child job names
    pub projects: String,

    /// Worst outcome that still triggers the children
    #[serde(default)]
    pub threshold: Outcome,
}

/// Join configuration of a split job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinDefinition {
    /// Comma-separated join job names
    #[serde(default)]
    pub projects: String,

    #[serde(default)]
    pub threshold: Threshold,

    #[serde(default)]
    pub propagate_from_downstream: bool,

    #[serde(default)]
    pub post_join: Vec<PostJoinDefinition>,
}

/// Post-join step, written as a single-key map
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostJoinDefinition {
    /// Start more projects, each gated by its own condition
    Trigger(Vec<TriggerConfig>),
    /// Write a line to the run output
    Echo(String),
    /// Always fail with the given message
    Fail(String),
}

impl JobDefinition {
    /// Build the registry job described by this definition
    pub fn to_job(&self) -> Job {
        let mut job = Job::new(self.name.trim());
        for trigger in &self.triggers {
            job = job.with_trigger(
                DownstreamTrigger::new(trigger.kind, trigger.projects.clone())
                    .with_threshold(trigger.threshold),
            );
        }
        if let Some(join) = &self.join {
            job = job.with_join(join.to_config());
        }
        job.set_disabled(self.disabled);
        job.set_buildable(self.buildable);
        job
    }

    pub fn script(&self) -> Script {
        Script {
            outcome: self.outcome,
            delay_ms: self.delay_ms,
        }
    }
}

impl JoinDefinition {
    pub fn to_config(&self) -> JoinConfig {
        self.post_join.iter().fold(
            JoinConfig::new(self.projects.clone())
                .with_threshold(self.threshold)
                .with_propagation(self.propagate_from_downstream),
            |config, step| config.with_action(step.to_step()),
        )
    }
}

impl PostJoinDefinition {
    pub fn to_step(&self) -> PostJoinStep {
        match self {
            PostJoinDefinition::Trigger(configs) => PostJoinStep::Trigger(configs.clone()),
            PostJoinDefinition::Echo(message) => {
                PostJoinStep::generic(EchoAction::new(message.clone()))
            }
            PostJoinDefinition::Fail(message) => {
                PostJoinStep::generic(FailingAction::new(message.clone()))
            }
        }
    }
}
