// Dependency graph resolution
// Downstream closures, union-edge augmentation and the engine-wide job graph

pub mod augment;
pub mod dependency;
pub mod resolver;

pub use augment::GraphAugmenter;
pub use dependency::{
    Dependency, DependencyGraph, DependencyKind, GraphError, GraphErrorKind, UnionEdge,
};
pub use resolver::{DownstreamProvider, GraphResolver, ResolverSettings, TriggerProvider};
