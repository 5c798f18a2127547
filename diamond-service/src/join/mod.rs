// Join engine
// Barriers, causation walking and the run-lifecycle coordinator

pub mod actions;
pub mod barrier;
pub mod coordinator;
pub mod walker;

pub use actions::{
    ActionContext, EchoAction, FailingAction, PostJoinAction, PostJoinStep, TriggerCondition,
    TriggerConfig,
};
pub use barrier::{BarrierState, JoinBarrier, Notification};
pub use coordinator::JoinRunCoordinator;
pub use walker::CausationWalker;
