//! Node emission: one container slot per model node.

use super::context::EmitContext;
use super::writer::{py_str, ScriptWriter};
use crate::topology::{Node, NodeKind};

pub fn emit(ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
    let model = ctx.model();
    w.section("nodes");
    w.line("nodes = ns.NodeContainer()");
    w.line(format!("nodes.Create({})", model.node_count()));
    for (index, node) in model.nodes().enumerate() {
        w.comment(format!("[node {}] id={} name={} kind={}", index, node.id(), node.name, node.kind()));
        if let Some(grid) = grid_summary(node) {
            w.comment(grid);
        }
        w.line(format!("ns.Names.Add({}, nodes.Get({}))", py_str(&node.id().to_string()), index));
    }
    emit_failover_order(ctx, w);
    w.blank();
}

/// Control centers and backups, preferred first
fn emit_failover_order(ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
    let mut candidates: Vec<(u8, &Node)> = ctx
        .model()
        .nodes()
        .filter_map(|node| {
            let grid = node.grid.as_ref()?;
            let control = matches!(node.kind(), NodeKind::ControlCenter | NodeKind::BackupControlCenter);
            (control || grid.is_backup).then_some((grid.failover_priority, node))
        })
        .collect();
    if candidates.is_empty() {
        return;
    }
    candidates.sort_by_key(|(priority, node)| (*priority, node.id()));

    w.comment("[failover] lower priority takes over first");
    for (rank, (priority, node)) in candidates.iter().enumerate() {
        let role = match node.grid.as_ref() {
            Some(grid) if grid.is_backup => "backup",
            _ => "primary",
        };
        w.comment(format!(
            "[failover {}] id={} name={} kind={} priority={} role={}",
            rank + 1,
            node.id(),
            node.name,
            node.kind(),
            priority,
            role
        ));
    }
}

fn grid_summary(node: &Node) -> Option<String> {
    let grid = node.grid.as_ref()?;
    let mut parts = vec![format!("protocol={}", grid.protocol)];
    if let Some(substation) = &grid.substation_id {
        parts.push(format!("substation={}", substation));
    }
    if let Some(voltage) = grid.voltage_level {
        parts.push(format!("voltage={}", voltage));
    }
    if let Some(scan) = grid.scan_class {
        parts.push(format!("scan={:?}", scan).to_lowercase());
    }
    if let Some(address) = grid.dnp3_address {
        parts.push(format!("dnp3_address={}", address));
    }
    if grid.is_backup {
        parts.push(format!("backup priority={}", grid.failover_priority));
    }
    Some(format!("grid {}", parts.join(" ")))
}
