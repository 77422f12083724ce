//! Program header: imports, RNG seeding and log components.

use std::collections::BTreeSet;

use super::context::EmitContext;
use super::writer::{py_str, ScriptWriter};
use crate::traffic::AppPlan;

/// Engine log level constant for a configured level name
fn log_level_constant(level: &str) -> Option<&'static str> {
    match level.to_lowercase().as_str() {
        "error" => Some("ns.LOG_LEVEL_ERROR"),
        "warn" => Some("ns.LOG_LEVEL_WARN"),
        "info" => Some("ns.LOG_LEVEL_INFO"),
        "debug" => Some("ns.LOG_LEVEL_DEBUG"),
        "function" => Some("ns.LOG_LEVEL_FUNCTION"),
        "logic" => Some("ns.LOG_LEVEL_LOGIC"),
        "all" => Some("ns.LOG_LEVEL_ALL"),
        _ => None,
    }
}

/// Application log components used by the emitted flows, sorted
fn log_components(ctx: &EmitContext<'_>) -> BTreeSet<&'static str> {
    let mut components = BTreeSet::new();
    for plan in ctx.flows.iter().filter(|f| f.runs()) {
        match plan.resolved.plan {
            AppPlan::Echo { .. } => {
                components.insert("UdpEchoClientApplication");
                components.insert("UdpEchoServerApplication");
            }
            AppPlan::OnOff { .. } => {
                components.insert("OnOffApplication");
                components.insert("PacketSink");
            }
            AppPlan::Bulk { .. } => {
                components.insert("BulkSendApplication");
                components.insert("PacketSink");
            }
            AppPlan::Custom { .. } => {}
        }
    }
    components
}

pub fn emit(ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
    let snapshot = ctx.snapshot;
    let general = snapshot.general();
    let model = ctx.model();

    w.line("#!/usr/bin/env python3");
    w.section("header");
    w.comment(format!(
        "Generated by gridnetsim {} from topology generation {}, project revision {}",
        env!("CARGO_PKG_VERSION"),
        snapshot.generation(),
        snapshot.revision()
    ));
    w.comment(format!(
        "{} node(s), {} link(s), {} flow(s), simulated for {}s",
        model.node_count(),
        model.link_count(),
        snapshot.flows().len(),
        general.duration
    ));
    if let Some(scenario) = snapshot.scenario().filter(|_| ctx.schedule.is_some()) {
        w.comment(format!("Failure scenario: {}", scenario.name));
    }
    let needs_importlib = ctx
        .flows
        .iter()
        .any(|f| f.runs() && matches!(f.resolved.plan, AppPlan::Custom { .. }));
    if needs_importlib {
        w.line("import importlib.util");
    }
    w.line("import os");
    w.line("import sys");
    w.blank();
    w.line("from ns import ns");
    w.blank();
    w.blank();
    w.line("def main():");
    w.indent();
    w.line(format!("ns.RngSeedManager.SetSeed({})", general.random_seed));
    w.line("ns.RngSeedManager.SetRun(1)");
    if let Some(level) = log_level_constant(&general.log_level) {
        for component in log_components(ctx) {
            w.line(format!("ns.LogComponentEnable({}, {})", py_str(component), level));
        }
    }
    w.line(format!(
        "os.makedirs({}, exist_ok=True)",
        py_str(&general.output_dir.to_string_lossy())
    ));
    w.blank();
}
