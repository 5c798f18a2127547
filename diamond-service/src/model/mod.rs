// Data Model
// Jobs, runs, outcomes and join configuration as seen by the join engine

pub mod job;
pub mod join;
pub mod outcome;
pub mod run;

pub use job::{DownstreamTrigger, Job, TriggerKind};
pub use join::JoinConfig;
pub use outcome::{Outcome, Threshold};
pub use run::{Cause, Run, RunId, VirtualRun};

/// Split a comma-separated job list, trimming entries and dropping blanks
pub fn parse_name_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join names back into the canonical comma-separated form
pub fn to_name_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| n.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}
