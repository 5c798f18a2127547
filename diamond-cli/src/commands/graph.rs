use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use diamond_service::{DependencyKind, Registry, TopologyParser};

/// Print the dependency graph of a topology
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Path to the topology YAML file
    pub topology: PathBuf,

    /// Emit edges as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Only print the closure of this job
    #[arg(long, value_name = "JOB")]
    pub job: Option<String>,
}

pub fn execute(args: GraphArgs) -> Result<()> {
    let topology = TopologyParser::from_file(&args.topology)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;
    let executor = topology.build_executor(None)?;
    let coordinator = executor.coordinator();
    let graph = coordinator.dependency_graph();

    if let Some(name) = &args.job {
        let job = executor
            .engine()
            .find_job(name)
            .ok_or_else(|| color_eyre::eyre::eyre!("Unknown job '{}'", name))?;
        let mut closure: Vec<String> = coordinator
            .resolver()
            .closure_names(&job, false, true)
            .into_iter()
            .collect();
        closure.sort();
        if args.json {
            println!("{}", serde_json::to_string_pretty(&closure)?);
        } else {
            output::header(&format!("Downstream of {}", name));
            for child in closure {
                println!("  {}", child);
            }
        }
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(graph.edges())?);
        return Ok(());
    }

    output::header(&format!("{} edge(s)", graph.edges().len()));
    for edge in graph.edges() {
        match &edge.kind {
            DependencyKind::Trigger {
                relationship,
                threshold,
            } => println!(
                "  {} -> {} ({}, up to {})",
                edge.upstream, edge.downstream, relationship, threshold
            ),
            DependencyKind::Union { owner } => output::dim(&format!(
                "  {} -> {} (join of {})",
                edge.upstream, edge.downstream, owner
            )),
        }
    }

    match graph.topological_sort() {
        Ok(order) => output::info(&format!("Order: {}", order.join(" -> "))),
        Err(e) => output::warning(&e.message),
    }

    Ok(())
}
