// Join configuration
// What a split job joins to, under which threshold, and what runs afterwards

use super::outcome::Threshold;
use super::parse_name_list;
use crate::join::actions::PostJoinStep;

/// Join configuration attached to a split job
#[derive(Debug, Clone)]
pub struct JoinConfig {
    /// Comma-separated list of join job names
    join_projects: String,
    threshold: Threshold,
    /// Whether a run started further downstream also builds a barrier for this config
    propagate_from_downstream: bool,
    post_join_actions: Vec<PostJoinStep>,
}

impl JoinConfig {
    pub fn new(join_projects: impl Into<String>) -> Self {
        Self {
            join_projects: join_projects.into(),
            threshold: Threshold::Success,
            propagate_from_downstream: false,
            post_join_actions: Vec::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_propagation(mut self, propagate: bool) -> Self {
        self.propagate_from_downstream = propagate;
        self
    }

    pub fn with_action(mut self, step: PostJoinStep) -> Self {
        self.post_join_actions.push(step);
        self
    }

    pub fn join_projects(&self) -> &str {
        &self.join_projects
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn propagates_from_downstream(&self) -> bool {
        self.propagate_from_downstream
    }

    pub fn post_join_actions(&self) -> &[PostJoinStep] {
        &self.post_join_actions
    }

    pub fn has_post_join_actions(&self) -> bool {
        !self.post_join_actions.is_empty()
    }

    /// Names from the plain join list
    pub fn join_project_names(&self) -> Vec<String> {
        parse_name_list(&self.join_projects)
    }

    /// Names started by trigger-config post-join actions
    pub fn trigger_action_project_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for step in &self.post_join_actions {
            if let PostJoinStep::Trigger(configs) = step {
                for config in configs {
                    for name in config.project_names() {
                        if !names.contains(&name) {
                            names.push(name);
                        }
                    }
                }
            }
        }
        names
    }

    /// Rewrite the join list after a job rename.
    ///
    /// Returns true when at least one entry matched `old_name`.
    pub fn on_job_renamed(&mut self, old_name: &str, new_name: &str) -> bool {
        if !self.join_projects.contains(old_name) {
            return false;
        }

        let mut changed = false;
        let projects: Vec<&str> = self
            .join_projects
            .split(',')
            .map(|entry| {
                if entry.trim() == old_name {
                    changed = true;
                    new_name
                } else {
                    entry
                }
            })
            .collect();

        if changed {
            self.join_projects = projects.join(",");
        }
        changed
    }
}
