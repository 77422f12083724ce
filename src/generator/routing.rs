//! Routing emission.
//!
//! Automatic nodes get the engine's global routing; their derived entries
//! appear only as comments. Manual nodes get one static install per
//! enabled entry. No node gets both.

use super::context::EmitContext;
use super::writer::ScriptWriter;
use crate::routing::{RouteEntry, RouteKind, RoutingMode};
use crate::topology::{Endpoint, Node};

pub fn emit(ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
    w.section("routing");
    if ctx.has_automatic() {
        w.line("ns.Ipv4GlobalRoutingHelper.PopulateRoutingTables()");
        for (index, node) in ctx.ip_nodes().filter(|(_, n)| n.routing.mode == RoutingMode::Automatic) {
            let derived = node.routing.derived_entries();
            if derived.is_empty() {
                continue;
            }
            w.comment(format!("[routes {}] id={} mode=automatic", index, node.id()));
            for entry in derived {
                w.comment(format!("  {}", entry));
            }
        }
    }

    if ctx.has_manual() {
        w.line("static_routing = ns.Ipv4StaticRoutingHelper()");
        for (index, node) in ctx.ip_nodes().filter(|(_, n)| n.routing.mode == RoutingMode::Manual) {
            emit_manual(ctx, index, node, w);
        }
    }
    w.blank();
}

fn emit_manual(ctx: &EmitContext<'_>, index: usize, node: &Node, w: &mut ScriptWriter) {
    let table = format!("static_{}", index);
    w.comment(format!("[routes {}] id={} mode=manual", index, node.id()));
    w.line(format!("{} = static_routing.GetStaticRouting(ipv4_{})", table, index));
    for entry in node.routing.manual_entries() {
        if !entry.enabled {
            w.comment(format!("disabled: {}", entry));
            continue;
        }
        if entry.kind == RouteKind::Connected {
            w.comment(format!("connected: {}", entry));
            continue;
        }
        let if_index = ctx
            .attachment(Endpoint::new(node.id(), entry.interface))
            .and_then(|a| a.if_index);
        let Some(if_index) = if_index else {
            continue;
        };
        w.line(static_install(&table, entry, if_index));
    }
}

fn static_install(table: &str, entry: &RouteEntry, if_index: u32) -> String {
    if entry.is_default() {
        format!(
            "{}.SetDefaultRoute(ns.Ipv4Address('{}'), {}, {})",
            table, entry.gateway, if_index, entry.metric
        )
    } else if entry.is_direct() {
        format!(
            "{}.AddNetworkRouteTo(ns.Ipv4Address('{}'), ns.Ipv4Mask('{}'), {}, {})",
            table,
            entry.destination,
            entry.netmask(),
            if_index,
            entry.metric
        )
    } else {
        format!(
            "{}.AddNetworkRouteTo(ns.Ipv4Address('{}'), ns.Ipv4Mask('{}'), ns.Ipv4Address('{}'), {}, {})",
            table,
            entry.destination,
            entry.netmask(),
            entry.gateway,
            if_index,
            entry.metric
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_install_forms() {
        let gw = "10.1.1.2".parse().unwrap();
        assert_eq!(
            static_install("static_0", &RouteEntry::default_route(gw, 1), 2),
            "static_0.SetDefaultRoute(ns.Ipv4Address('10.1.1.2'), 2, 0)"
        );
        assert_eq!(
            static_install("static_0", &RouteEntry::via("10.1.5.0".parse().unwrap(), 24, gw, 1, 3), 2),
            "static_0.AddNetworkRouteTo(ns.Ipv4Address('10.1.5.0'), ns.Ipv4Mask('255.255.255.0'), \
             ns.Ipv4Address('10.1.1.2'), 2, 3)"
        );
        let mut direct = RouteEntry::via("10.1.6.0".parse().unwrap(), 24, gw, 1, 0);
        direct.gateway = std::net::Ipv4Addr::UNSPECIFIED;
        assert_eq!(
            static_install("static_0", &direct, 1),
            "static_0.AddNetworkRouteTo(ns.Ipv4Address('10.1.6.0'), ns.Ipv4Mask('255.255.255.0'), 1, 0)"
        );
    }
}
