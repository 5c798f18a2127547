// Diamond CLI
// Runs, validates and inspects diamond topologies described in YAML

mod commands;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "diamond", version, about = "Join barriers for diamond-shaped build topologies")]
struct Cli {
    /// Show engine diagnostics (overridden by RUST_LOG)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a job and run the topology until nothing is left to do
    Run(commands::run::RunArgs),
    /// Check a topology file for mistakes
    Validate(commands::validate::ValidateArgs),
    /// Print the dependency graph, union edges included
    Graph(commands::graph::GraphArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "diamond_service=debug,info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run(args) => commands::run::execute(args).await,
        Command::Validate(args) => commands::validate::execute(args),
        Command::Graph(args) => commands::graph::execute(args),
    }
}
