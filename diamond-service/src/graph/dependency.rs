// Dependency Graph
// The engine-wide job graph: triggering edges plus advisory union edges

use crate::model::Outcome;

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

/// Error type for graph operations
#[derive(Debug, Clone)]
pub struct GraphError {
    pub message: String,
    pub kind: GraphErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphErrorKind {
    /// Circular dependency detected
    CyclicDependency,
    /// Edge references a job that is not a node
    UnknownDependency,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph error: {}", self.message)
    }
}

impl std::error::Error for GraphError {}

impl GraphError {
    pub fn cyclic(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::CyclicDependency,
        }
    }

    pub fn unknown_dependency(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::UnknownDependency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DependencyKind {
    /// Finishing the upstream job starts the downstream job
    Trigger {
        relationship: String,
        threshold: Outcome,
    },
    /// Ordering-only edge added for a join; never starts anything
    Union { owner: String },
}

/// A directed edge `upstream -> downstream`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Dependency {
    pub upstream: String,
    pub downstream: String,
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn trigger(
        upstream: impl Into<String>,
        downstream: impl Into<String>,
        relationship: impl Into<String>,
        threshold: Outcome,
    ) -> Self {
        Self {
            upstream: upstream.into(),
            downstream: downstream.into(),
            kind: DependencyKind::Trigger {
                relationship: relationship.into(),
                threshold,
            },
        }
    }

    /// Whether a finished upstream run with `outcome` should start the downstream job
    pub fn should_trigger(&self, outcome: Outcome) -> bool {
        match &self.kind {
            DependencyKind::Trigger { threshold, .. } => outcome.is_better_or_equal(*threshold),
            DependencyKind::Union { .. } => false,
        }
    }

    pub fn is_union(&self) -> bool {
        matches!(self.kind, DependencyKind::Union { .. })
    }
}

/// Synthetic ordering edge from a split-closure node to a join target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnionEdge {
    /// Job whose join configuration produced the edge
    pub owner: String,
    pub from: String,
    pub to: String,
}

impl From<UnionEdge> for Dependency {
    fn from(edge: UnionEdge) -> Self {
        Dependency {
            upstream: edge.from,
            downstream: edge.to,
            kind: DependencyKind::Union { owner: edge.owner },
        }
    }
}

/// Engine dependency graph keyed by job name
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    edges: Vec<Dependency>,
    edge_set: HashSet<Dependency>,
    downstream: HashMap<String, Vec<usize>>,
    upstream: HashMap<String, Vec<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>) {
        self.nodes.insert(name.into());
    }

    /// Add an edge. Returns false if the identical edge is already present.
    pub fn add_dependency(&mut self, dependency: Dependency) -> bool {
        if self.edge_set.contains(&dependency) {
            return false;
        }
        let index = self.edges.len();
        self.nodes.insert(dependency.upstream.clone());
        self.nodes.insert(dependency.downstream.clone());
        self.downstream
            .entry(dependency.upstream.clone())
            .or_default()
            .push(index);
        self.upstream
            .entry(dependency.downstream.clone())
            .or_default()
            .push(index);
        self.edge_set.insert(dependency.clone());
        self.edges.push(dependency);
        true
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn edges(&self) -> &[Dependency] {
        &self.edges
    }

    pub fn union_edges(&self) -> impl Iterator<Item = &Dependency> {
        self.edges.iter().filter(|d| d.is_union())
    }

    /// Outgoing edges of a job
    pub fn downstream_of(&self, name: &str) -> Vec<&Dependency> {
        self.edge_refs(self.downstream.get(name))
    }

    /// Incoming edges of a job
    pub fn upstream_of(&self, name: &str) -> Vec<&Dependency> {
        self.edge_refs(self.upstream.get(name))
    }

    /// Distinct names of jobs with an edge into `name`, in insertion order
    pub fn upstream_names(&self, name: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for dep in self.upstream_of(name) {
            if !names.contains(&dep.upstream) {
                names.push(dep.upstream.clone());
            }
        }
        names
    }

    fn edge_refs(&self, indices: Option<&Vec<usize>>) -> Vec<&Dependency> {
        indices
            .map(|idx| idx.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Topological sort using Kahn's algorithm.
    /// Returns job names in an order they could be started.
    pub fn topological_sort(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.as_str(), 0)).collect();
        for dep in &self.edges {
            *in_degree.entry(dep.downstream.as_str()).or_insert(0) += 1;
        }

        // Nodes are a BTreeSet, so the seed order is deterministic
        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .map(String::as_str)
            .filter(|n| in_degree.get(n) == Some(&0))
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(node) = queue.pop_front() {
            result.push(node.to_string());
            for dep in self.downstream_of(node) {
                if let Some(degree) = in_degree.get_mut(dep.downstream.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dep.downstream.as_str());
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            let stuck: Vec<&str> = in_degree
                .iter()
                .filter(|(_, &deg)| deg > 0)
                .map(|(&name, _)| name)
                .collect();
            return Err(GraphError::cyclic(format!(
                "circular dependency detected between: {}",
                stuck.join(", ")
            )));
        }

        Ok(result)
    }

    /// Check that every edge endpoint is a known job
    pub fn validate_against(&self, known: &HashSet<String>) -> Result<(), GraphError> {
        for dep in &self.edges {
            for name in [&dep.upstream, &dep.downstream] {
                if !known.contains(name) {
                    return Err(GraphError::unknown_dependency(format!(
                        "edge {} -> {} references unknown job '{}'",
                        dep.upstream, dep.downstream, name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(up: &str, down: &str) -> Dependency {
        Dependency::trigger(up, down, "standard", Outcome::Success)
    }

    fn union(owner: &str, from: &str, to: &str) -> Dependency {
        UnionEdge {
            owner: owner.into(),
            from: from.into(),
            to: to.into(),
        }
        .into()
    }

    #[test]
    fn test_duplicate_edges_are_ignored() {
        let mut graph = DependencyGraph::new();
        assert!(graph.add_dependency(trigger("a", "b")));
        assert!(!graph.add_dependency(trigger("a", "b")));
        assert!(graph.add_dependency(union("a", "a", "b")));
        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.union_edges().count(), 1);
    }

    #[test]
    fn test_should_trigger() {
        let edge = Dependency::trigger("a", "b", "standard", Outcome::Unstable);
        assert!(edge.should_trigger(Outcome::Success));
        assert!(edge.should_trigger(Outcome::Unstable));
        assert!(!edge.should_trigger(Outcome::Failure));

        let edge = union("root", "a", "join");
        assert!(!edge.should_trigger(Outcome::Success));
    }

    #[test]
    fn test_upstream_names() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(trigger("a", "c"));
        graph.add_dependency(union("root", "a", "c"));
        graph.add_dependency(trigger("b", "c"));

        assert_eq!(graph.upstream_names("c"), vec!["a", "b"]);
        assert!(graph.upstream_names("a").is_empty());
        assert_eq!(graph.downstream_of("a").len(), 2);
    }

    #[test]
    fn test_topological_sort() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(trigger("root", "a"));
        graph.add_dependency(trigger("root", "b"));
        graph.add_dependency(union("root", "a", "join"));
        graph.add_dependency(union("root", "b", "join"));
        graph.add_dependency(union("root", "root", "join"));

        let order = graph.topological_sort().unwrap();
        assert_eq!(order.first().map(String::as_str), Some("root"));
        assert_eq!(order.last().map(String::as_str), Some("join"));
    }

    #[test]
    fn test_circular_dependency() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(trigger("a", "b"));
        graph.add_dependency(trigger("b", "c"));
        graph.add_dependency(trigger("c", "a"));

        let err = graph.topological_sort().unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::CyclicDependency);
    }

    #[test]
    fn test_validate_against_known_jobs() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(trigger("a", "ghost"));

        let known: HashSet<String> = ["a".to_string()].into_iter().collect();
        let err = graph.validate_against(&known).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::UnknownDependency);
    }
}
