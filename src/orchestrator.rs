//! Project-to-program orchestration.
//!
//! This module drives one run from a project file on disk to a written
//! simulation program: load, address, route, snapshot, generate, write.

use crate::config_loader::load_project;
use crate::generator::{GeneratedScript, GeneratorOptions, ScriptGenerator};
use crate::project::Project;
use crate::utils::script::{script_path, write_script};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Knobs the CLI exposes
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Re-run address assignment even if every port already has an address
    pub reassign_addresses: bool,
    /// Leave the failure section out of the program
    pub skip_failures: bool,
    /// Validate and generate in memory only
    pub check_only: bool,
    /// Skip the per-flow console summary after the run
    pub quiet_stats: bool,
    /// Have the program print a line per device packet event
    pub packet_trace: bool,
}

impl RunOptions {
    /// Generator settings these options select
    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            include_failures: !self.skip_failures,
            console_stats: !self.quiet_stats,
            packet_trace: self.packet_trace,
        }
    }
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Written program, `None` in check mode
    pub script_path: Option<PathBuf>,
    /// Flow statistics file the program will produce
    pub results_path: Option<PathBuf>,
    pub generation: u64,
    pub revision: u64,
    pub script_bytes: usize,
}

/// Bring a loaded project to a generatable state: addresses on every
/// connected port and fresh automatic routes.
pub fn prepare_project(project: &mut Project, reassign_addresses: bool) -> Result<()> {
    if reassign_addresses || !project.topology.is_fully_addressed() {
        let policy = project.general.addressing.clone();
        let plan = project
            .topology
            .assign_addresses(&policy)
            .wrap_err("Failed to assign interface addresses")?;
        info!("Assigned addresses to {} subnet(s)", plan.subnets.len());
    } else {
        debug!("Every connected port already has an address; keeping them");
    }

    let summary = project.topology.compute_routes();
    info!(
        "Computed {} route(s) for {} automatic node(s); {} node(s) route manually",
        summary.entries, summary.automatic_nodes, summary.manual_nodes
    );
    Ok(())
}

/// Generate the program text for a prepared project
pub fn generate_program(project: &Project, options: &RunOptions) -> Result<GeneratedScript> {
    let snapshot = project.snapshot();
    let generator = ScriptGenerator::new(options.generator_options());
    let script = generator
        .generate(&snapshot)
        .wrap_err("Failed to generate simulation program")?;
    Ok(script)
}

/// Full run from a project file to a written program
pub fn run(project_path: &Path, output: &Path, options: &RunOptions) -> Result<RunReport> {
    let mut project = load_project(project_path)?;
    info!(
        "Project has {} node(s), {} link(s), {} flow(s)",
        project.topology.node_count(),
        project.topology.link_count(),
        project.flows().len()
    );

    prepare_project(&mut project, options.reassign_addresses)?;
    let script = generate_program(&project, options)?;

    let mut report = RunReport {
        script_path: None,
        results_path: script.results_path.clone(),
        generation: script.generation,
        revision: script.revision,
        script_bytes: script.text.len(),
    };

    if options.check_only {
        info!("Check passed; {} byte program not written", report.script_bytes);
        return Ok(report);
    }

    let path = script_path(output);
    write_script(&path, &script.text)?;
    info!("Wrote simulation program: {:?}", path);
    match &report.results_path {
        Some(results) => info!("Flow statistics will be written to {:?}", results),
        None => info!("Flow monitor disabled; no statistics file will be produced"),
    }
    report.script_path = Some(path);
    Ok(report)
}
