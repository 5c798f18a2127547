// Graph Resolver
// Transitive downstream closure across every registered relationship provider

use super::dependency::Dependency;
use crate::model::{Job, JoinConfig, TriggerKind};
use crate::registry::Registry;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

/// One independent mechanism through which a job names its children
pub trait DownstreamProvider: Send + Sync {
    /// Label used on the edges this provider contributes
    fn relationship(&self) -> &str;

    /// Direct children of `job` through this relationship
    fn children_of(&self, job: &Job, registry: &dyn Registry) -> Vec<Arc<Job>>;

    /// Edges this relationship contributes to the engine dependency graph
    fn dependencies_of(&self, job: &Job, registry: &dyn Registry) -> Vec<Dependency> {
        self.children_of(job, registry)
            .into_iter()
            .map(|child| {
                Dependency::trigger(
                    job.name(),
                    child.name(),
                    self.relationship(),
                    Default::default(),
                )
            })
            .collect()
    }
}

/// Provider for the triggers a job declares of one [`TriggerKind`]
#[derive(Debug, Clone, Copy)]
pub struct TriggerProvider {
    kind: TriggerKind,
    label: &'static str,
}

impl TriggerProvider {
    pub fn new(kind: TriggerKind) -> Self {
        let label = match kind {
            TriggerKind::Standard => "standard",
            TriggerKind::Extended => "extended",
            TriggerKind::Parameterized => "parameterized",
        };
        Self { kind, label }
    }

    pub fn kind(&self) -> TriggerKind {
        self.kind
    }
}

impl DownstreamProvider for TriggerProvider {
    fn relationship(&self) -> &str {
        self.label
    }

    fn children_of(&self, job: &Job, registry: &dyn Registry) -> Vec<Arc<Job>> {
        job.triggers_of(self.kind)
            .flat_map(|trigger| registry.resolve_names(&trigger.project_names()))
            .collect()
    }

    fn dependencies_of(&self, job: &Job, registry: &dyn Registry) -> Vec<Dependency> {
        let mut deps = Vec::new();
        for trigger in job.triggers_of(self.kind) {
            for child in registry.resolve_names(&trigger.project_names()) {
                deps.push(Dependency::trigger(
                    job.name(),
                    child.name(),
                    self.label,
                    trigger.threshold,
                ));
            }
        }
        deps
    }
}

/// Which relationships the resolver walks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Registered trigger mechanisms
    pub relationships: Vec<TriggerKind>,
    /// Whether trigger-config post-join actions contribute join targets
    pub resolve_trigger_actions: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            relationships: TriggerKind::ALL.to_vec(),
            resolve_trigger_actions: true,
        }
    }
}

/// Computes downstream closures over the registry.
///
/// The visited set is shared across providers and recursion, so cycles
/// formed through different relationship kinds terminate.
pub struct GraphResolver {
    registry: Arc<dyn Registry>,
    providers: Vec<Arc<dyn DownstreamProvider>>,
    resolve_trigger_actions: bool,
}

impl GraphResolver {
    /// Resolver with every built-in relationship registered
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self::with_settings(registry, &ResolverSettings::default())
    }

    pub fn with_settings(registry: Arc<dyn Registry>, settings: &ResolverSettings) -> Self {
        let mut seen = HashSet::new();
        let providers = settings
            .relationships
            .iter()
            .filter(|kind| seen.insert(**kind))
            .map(|kind| Arc::new(TriggerProvider::new(*kind)) as Arc<dyn DownstreamProvider>)
            .collect();

        Self {
            registry,
            providers,
            resolve_trigger_actions: settings.resolve_trigger_actions,
        }
    }

    /// Register an additional relationship provider
    pub fn with_provider(mut self, provider: Arc<dyn DownstreamProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub fn providers(&self) -> &[Arc<dyn DownstreamProvider>] {
        &self.providers
    }

    /// Plain join list of a config, resolved against the registry
    pub fn join_targets(&self, config: &JoinConfig) -> Vec<Arc<Job>> {
        self.registry.resolve_names(&config.join_project_names())
    }

    /// Join list plus the projects of trigger-config post-join actions
    pub fn all_join_targets(&self, config: &JoinConfig) -> Vec<Arc<Job>> {
        let mut names = config.join_project_names();
        if self.resolve_trigger_actions {
            for name in config.trigger_action_project_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        self.registry.resolve_names(&names)
    }

    /// Transitive downstream jobs of `job`, excluding `job` itself.
    ///
    /// With `direct_only` only the first level of each provider is taken.
    /// With `include_join` join targets are additional children and are
    /// always expanded, even in direct mode.
    pub fn downstream_closure(
        &self,
        job: &Job,
        direct_only: bool,
        include_join: bool,
    ) -> Vec<Arc<Job>> {
        let mut seen = HashSet::new();
        seen.insert(job.name().to_string());
        let mut out = Vec::new();
        self.collect(job, direct_only, include_join, &mut seen, &mut out);
        trace!(
            job = job.name(),
            direct_only,
            include_join,
            count = out.len(),
            "resolved downstream closure"
        );
        out
    }

    /// Names in `downstream_closure`, for membership checks
    pub fn closure_names(
        &self,
        job: &Job,
        direct_only: bool,
        include_join: bool,
    ) -> HashSet<String> {
        self.downstream_closure(job, direct_only, include_join)
            .iter()
            .map(|j| j.name().to_string())
            .collect()
    }

    /// Schedulable targets of the plain join list, each followed by its
    /// non-join closure.
    ///
    /// Trigger-step projects are left out: they only run when their
    /// condition holds, so nothing may wait on them.
    pub fn join_target_hierarchy(&self, config: &JoinConfig) -> Vec<Arc<Job>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for target in self.join_targets(config) {
            if !target.is_schedulable() {
                continue;
            }
            if seen.insert(target.name().to_string()) {
                out.push(target.clone());
            }
            for job in self.downstream_closure(&target, false, false) {
                if seen.insert(job.name().to_string()) {
                    out.push(job);
                }
            }
        }
        out
    }

    fn collect(
        &self,
        job: &Job,
        direct_only: bool,
        include_join: bool,
        seen: &mut HashSet<String>,
        out: &mut Vec<Arc<Job>>,
    ) {
        for provider in &self.providers {
            for child in provider.children_of(job, self.registry.as_ref()) {
                if !seen.insert(child.name().to_string()) {
                    continue;
                }
                out.push(child.clone());
                if !direct_only {
                    self.collect(&child, false, include_join, seen, out);
                }
            }
        }

        if !include_join {
            return;
        }
        let Some(config) = job.join_config() else {
            return;
        };
        for target in self.all_join_targets(&config) {
            if !seen.insert(target.name().to_string()) {
                continue;
            }
            out.push(target.clone());
            self.collect(&target, direct_only, true, seen, out);
        }
    }
}
