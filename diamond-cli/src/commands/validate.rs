use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use diamond_service::{TopologyParser, TopologyValidator};

/// Validate a topology YAML file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the topology YAML file
    pub topology: PathBuf,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let path = &args.topology;
    if !path.exists() {
        color_eyre::eyre::bail!("Topology file not found: {}", path.display());
    }

    // Step 1: Parse YAML syntax
    output::status("Validating", &format!("{}", path.display()));

    let topology = match TopologyParser::from_file(path) {
        Ok(t) => t,
        Err(e) => {
            output::error(&format!("Parse error: {}", e.message));
            if !e.context.is_empty() {
                eprint!("{}", e.context);
            }
            if let Some(suggestion) = &e.suggestion {
                output::info(&format!("  Suggestion: {}", suggestion));
            }
            std::process::exit(1);
        }
    };

    output::check("YAML syntax valid");

    let joins = topology.jobs.iter().filter(|j| j.join.is_some()).count();
    let triggers: usize = topology.jobs.iter().map(|j| j.triggers.len()).sum();
    output::check(&format!(
        "Structure: {} jobs, {} trigger declarations, {} joins",
        topology.jobs.len(),
        triggers,
        joins
    ));

    // Step 2: Semantic validation
    let report = TopologyValidator::report(&topology);
    for warning in &report.warnings {
        output::warning(&format!("[{}] {}", warning.path, warning.message));
    }
    if !report.is_valid() {
        output::error(&format!("{} validation error(s):", report.errors.len()));
        for error in &report.errors {
            output::error(&format!("  - [{}] {}", error.path, error.message));
            if let Some(suggestion) = &error.suggestion {
                output::info(&format!("    Suggestion: {}", suggestion));
            }
        }
        std::process::exit(1);
    }
    if args.strict && !report.warnings.is_empty() {
        output::error(&format!(
            "{} warning(s) with --strict",
            report.warnings.len()
        ));
        std::process::exit(1);
    }
    output::check("Semantic validation passed");

    // Step 3: Join ordering
    let executor = topology.build_executor(None)?;
    let graph = executor.coordinator().dependency_graph();
    let union_edges = graph.union_edges().count();
    output::check(&format!(
        "Dependency graph: {} edges, {} added for joins",
        graph.edges().len(),
        union_edges
    ));

    println!();
    output::success("Topology is valid");

    Ok(())
}
