// Graph Augmenter
// Union edges ordering join targets after every job of a split's closure

use super::dependency::{DependencyGraph, UnionEdge};
use super::resolver::GraphResolver;
use crate::model::Job;

use std::collections::HashSet;
use tracing::debug;

pub struct GraphAugmenter<'a> {
    resolver: &'a GraphResolver,
}

impl<'a> GraphAugmenter<'a> {
    pub fn new(resolver: &'a GraphResolver) -> Self {
        Self { resolver }
    }

    /// Union edges contributed by `owner`'s join configuration.
    ///
    /// Every node of the owner's closure (join edges included) plus the owner
    /// itself gets an edge to every join target, except nodes that are a
    /// target or sit downstream of one.
    pub fn union_edges(&self, owner: &Job) -> Vec<UnionEdge> {
        let Some(config) = owner.join_config() else {
            return Vec::new();
        };
        let targets = self.resolver.all_join_targets(&config);
        if targets.is_empty() {
            return Vec::new();
        }

        let mut excluded: HashSet<String> =
            targets.iter().map(|t| t.name().to_string()).collect();
        for target in &targets {
            excluded.extend(self.resolver.closure_names(target, false, true));
        }

        let mut nodes: Vec<String> = self
            .resolver
            .downstream_closure(owner, false, true)
            .iter()
            .map(|j| j.name().to_string())
            .collect();
        nodes.push(owner.name().to_string());

        let mut edges = Vec::new();
        for node in nodes {
            if excluded.contains(&node) {
                debug!(owner = owner.name(), node = %node, "no union edge for join-side node");
                continue;
            }
            for target in &targets {
                edges.push(UnionEdge {
                    owner: owner.name().to_string(),
                    from: node.clone(),
                    to: target.name().to_string(),
                });
            }
        }
        edges
    }

    /// Add `owner`'s union edges to the graph. Returns how many were new.
    pub fn augment(&self, owner: &Job, graph: &mut DependencyGraph) -> usize {
        let mut added = 0;
        for edge in self.union_edges(owner) {
            if graph.add_dependency(edge.into()) {
                added += 1;
            }
        }
        if added > 0 {
            debug!(owner = owner.name(), added, "added union edges");
        }
        added
    }
}
