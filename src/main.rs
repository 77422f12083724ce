use clap::Parser;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use gridnetsim::orchestrator::{self, RunOptions};

/// Generate ns-3 simulation programs from power-grid communication topologies
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the project file (YAML, or JSON by extension)
    #[arg(short, long)]
    project: PathBuf,

    /// Output directory, or a `.py` file path for the generated program
    #[arg(short, long, default_value = "ns3_output")]
    output: PathBuf,

    /// Reassign every interface address even if the project already has them
    #[arg(long)]
    reassign_addresses: bool,

    /// Leave the failure scenario out of the generated program
    #[arg(long)]
    no_failures: bool,

    /// Validate and generate without writing anything
    #[arg(long)]
    check: bool,

    /// Do not print per-flow statistics when the simulation ends
    #[arg(long)]
    quiet_stats: bool,

    /// Print a PKT line for every device transmit, receive and drop
    #[arg(long)]
    packet_trace: bool,
}

impl Args {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            reassign_addresses: self.reassign_addresses,
            skip_failures: self.no_failures,
            check_only: self.check,
            quiet_stats: self.quiet_stats,
            packet_trace: self.packet_trace,
        }
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting gridnetsim v{}", env!("CARGO_PKG_VERSION"));
    info!("Project file: {:?}", args.project);
    info!("Output: {:?}", args.output);

    let report = orchestrator::run(&args.project, &args.output, &args.run_options())?;

    if let Some(path) = &report.script_path {
        info!("Ready to run the simulation with: python3 {:?}", path);
    }
    info!(
        "Generation completed (topology generation {}, project revision {})",
        report.generation, report.revision
    );
    Ok(())
}
