// Diamond Service Library
// Join barriers for diamond-shaped build topologies, with a local engine to drive them

pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod join;
pub mod model;
pub mod parser;
pub mod registry;

// Re-export commonly used types
pub use error::{ErrorKind, ServiceError, ServiceResult};

// Re-export model types
pub use model::{
    Cause, DownstreamTrigger, Job, JoinConfig, Outcome, Run, RunId, Threshold, TriggerKind,
    VirtualRun,
};

// Re-export registry seams
pub use registry::{CausationSource, ExecutionEngine, Registry, Scheduler};

// Re-export graph types
pub use graph::{
    Dependency, DependencyGraph, DependencyKind, GraphAugmenter, GraphError, GraphResolver,
    ResolverSettings,
};

// Re-export join engine types
pub use join::{
    BarrierState, CausationWalker, JoinBarrier, JoinRunCoordinator, PostJoinAction,
    PostJoinStep, TriggerCondition, TriggerConfig,
};

// Re-export execution types
pub use engine::{ExecutorConfig, JobRunner, LocalEngine, LocalExecutor, ScriptedRunner};
pub use events::{progress_channel, JoinEvent, LogLevel, ProgressReceiver, ProgressSender};

// Re-export parser types
pub use parser::{ParseError, Topology, TopologyParser, TopologyValidator, ValidationError};
