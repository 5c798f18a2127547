// Local execution engine
// In-process stand-in for a build server, used to drive the join engine end to end

pub mod executor;
pub mod local;
pub mod runner;

pub use executor::{ExecutorConfig, LocalExecutor};
pub use local::{LocalEngine, ScheduleRequest};
pub use runner::{JobRunner, Script, ScriptedRunner};
