//! # GridNetSim - Network modeling and ns-3 program generation for grid communications
//!
//! This library models communication networks, from plain host/router/switch
//! LANs to power-grid SCADA networks, and translates a model into a
//! self-contained ns-3 Python program.
//!
//! ## Overview
//!
//! A project bundles a topology (nodes, ports, links, addresses and routes),
//! traffic flows between nodes and an optional failure scenario. The script
//! generator reads an immutable snapshot of the project and emits one program
//! that builds the network, installs the applications, injects the failures
//! at their scheduled times and writes flow statistics.
//!
//! ## Key Features
//!
//! - **Typed topology**: generic and grid node kinds with port-level links
//! - **Addressing**: deterministic per-broadcast-domain subnet assignment
//! - **Routing**: automatic (derived) or manual static routes per node
//! - **Grid traffic**: SCADA polling, protection and telemetry classes with DSCP priorities
//! - **Failures**: link, node and interface faults, degradations, floods and cascades
//! - **Deterministic output**: identical snapshots produce identical programs
//!
//! ## Architecture
//!
//! - `topology`: nodes, ports, links and the mutable topology model
//! - `ip`: broadcast domains, address registry and subnet allocation
//! - `routing`: routing tables and automatic route derivation
//! - `traffic`: flows, grid traffic classes and application resolution
//! - `failure`: events, scenarios, templates and the effect scheduler
//! - `generator`: ns-3 program emission, one sub-module per section
//! - `project`: the composed model and its snapshots
//! - `config` / `config_loader`: simulation settings and project files
//! - `orchestrator`: load, prepare, generate and write in one call
//! - `utils`: rate and delay parsing, validation, IP helpers, script output
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use gridnetsim::orchestrator::{self, RunOptions};
//! use std::path::Path;
//!
//! let report = orchestrator::run(
//!     Path::new("substation.yaml"),
//!     Path::new("ns3_output"),
//!     &RunOptions::default(),
//! )?;
//!
//! // ns3_output/simulation.py is ready to run with python3
//! println!("{:?}", report.script_path);
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Project Format
//!
//! ```yaml
//! general:
//!   duration: 30.0
//!   output_dir: "results"
//!
//! topology:
//!   nodes:
//!     - {id: 1, name: "scada", kind: CONTROL_CENTER, ports: [{index: 0, link: 1}]}
//!     - {id: 2, name: "rtu-1", kind: RTU, ports: [{index: 0, link: 1}]}
//!   links:
//!     - id: 1
//!       a: {node: 1, port: 0}
//!       b: {node: 2, port: 0}
//!       kind: FIBER
//!       params: {data_rate: "1Gbps", delay: "0.1ms"}
//!
//! flows:
//!   - {id: 1, source: 1, target: 2, grid: {class: INTEGRITY_POLL}}
//! ```
//!
//! ## Error Handling
//!
//! Model operations return [`error::Result`] with a typed [`error::ModelError`].
//! The loader and orchestrator wrap those in `color_eyre` reports with context.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod failure;
pub mod generator;
pub mod ip;
pub mod orchestrator;
pub mod project;
pub mod routing;
pub mod topology;
pub mod traffic;
pub mod utils;

pub use error::{ModelError, Result, Violation};
pub use project::{ModelSnapshot, Project};
