// Job model
// Registry-owned job identity, buildability flags and downstream trigger declarations

use super::join::JoinConfig;
use super::outcome::Outcome;
use super::parse_name_list;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Independent mechanisms by which one job can trigger another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Plain "build other projects" trigger
    #[default]
    Standard,
    /// Extended downstream trigger with its own result condition
    Extended,
    /// Parameterized trigger
    Parameterized,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 3] = [
        TriggerKind::Standard,
        TriggerKind::Extended,
        TriggerKind::Parameterized,
    ];
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TriggerKind::Standard => "standard",
            TriggerKind::Extended => "extended",
            TriggerKind::Parameterized => "parameterized",
        };
        f.write_str(label)
    }
}

/// A downstream trigger declared on a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownstreamTrigger {
    pub kind: TriggerKind,
    /// Comma-separated list of child job names
    pub projects: String,
    /// Worst upstream outcome that still triggers the children
    pub threshold: Outcome,
}

impl DownstreamTrigger {
    pub fn new(kind: TriggerKind, projects: impl Into<String>) -> Self {
        Self {
            kind,
            projects: projects.into(),
            threshold: Outcome::Success,
        }
    }

    pub fn with_threshold(mut self, threshold: Outcome) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn project_names(&self) -> Vec<String> {
        parse_name_list(&self.projects)
    }
}

/// A job known to the registry.
///
/// The enabled/buildable flags and the join configuration can change while
/// runs are in flight, so they sit behind atomics and a lock.
#[derive(Debug)]
pub struct Job {
    name: String,
    disabled: AtomicBool,
    buildable: AtomicBool,
    triggers: Vec<DownstreamTrigger>,
    join: RwLock<Option<Arc<JoinConfig>>>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disabled: AtomicBool::new(false),
            buildable: AtomicBool::new(true),
            triggers: Vec::new(),
            join: RwLock::new(None),
        }
    }

    pub fn with_trigger(mut self, trigger: DownstreamTrigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Shorthand for a standard trigger to the given children
    pub fn triggering(self, projects: impl Into<String>) -> Self {
        self.with_trigger(DownstreamTrigger::new(TriggerKind::Standard, projects))
    }

    pub fn with_join(self, config: JoinConfig) -> Self {
        *self.join.write() = Some(Arc::new(config));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub fn is_buildable(&self) -> bool {
        self.buildable.load(Ordering::Acquire)
    }

    /// Enabled and buildable
    pub fn is_schedulable(&self) -> bool {
        !self.is_disabled() && self.is_buildable()
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Release);
    }

    pub fn set_buildable(&self, buildable: bool) {
        self.buildable.store(buildable, Ordering::Release);
    }

    pub fn triggers(&self) -> &[DownstreamTrigger] {
        &self.triggers
    }

    /// Triggers of one relationship kind
    pub fn triggers_of(&self, kind: TriggerKind) -> impl Iterator<Item = &DownstreamTrigger> {
        self.triggers.iter().filter(move |t| t.kind == kind)
    }

    pub fn join_config(&self) -> Option<Arc<JoinConfig>> {
        self.join.read().clone()
    }

    pub fn set_join_config(&self, config: Option<JoinConfig>) {
        *self.join.write() = config.map(Arc::new);
    }

    /// Rewrite the join target list after `old_name` was renamed.
    ///
    /// Barriers already holding the previous config keep it; only new
    /// barriers see the rewritten list.
    pub fn rename_join_target(&self, old_name: &str, new_name: &str) -> bool {
        let mut guard = self.join.write();
        let Some(current) = guard.as_ref() else {
            return false;
        };

        let mut updated = JoinConfig::clone(current);
        if !updated.on_job_renamed(old_name, new_name) {
            return false;
        }
        *guard = Some(Arc::new(updated));
        true
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Job {}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
