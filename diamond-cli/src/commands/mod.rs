// CLI subcommands

pub mod graph;
pub mod run;
pub mod validate;
