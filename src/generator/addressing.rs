//! Internet stacks, bridges and explicit interface/address binding.

use super::context::EmitContext;
use super::writer::ScriptWriter;
use crate::routing::RoutingMode;
use crate::topology::Endpoint;
use crate::utils::ip_utils::netmask;

pub fn emit(ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
    w.section("addressing");
    if ctx.has_automatic() && ctx.schedule.is_some() {
        w.line("ns.Config.SetDefault('ns3::Ipv4GlobalRouting::RespondToInterfaceEvents', ns.BooleanValue(True))");
    }
    emit_stacks(ctx, w);
    emit_bridges(ctx, w);
    emit_bindings(ctx, w);
}

fn emit_stacks(ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
    for mode in [RoutingMode::Automatic, RoutingMode::Manual] {
        let members: Vec<usize> = ctx
            .ip_nodes()
            .filter(|(_, n)| n.routing.mode == mode)
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            continue;
        }
        let (stack, container) = match mode {
            RoutingMode::Automatic => ("stack_auto", "auto_nodes"),
            RoutingMode::Manual => ("stack_manual", "manual_nodes"),
        };
        w.comment(format!("{} routing stack", mode));
        w.line(format!("{} = ns.InternetStackHelper()", stack));
        match mode {
            RoutingMode::Automatic => {
                w.line("list_routing = ns.Ipv4ListRoutingHelper()");
                w.line("list_routing.Add(ns.Ipv4StaticRoutingHelper(), 0)");
                w.line("list_routing.Add(ns.Ipv4GlobalRoutingHelper(), -10)");
                w.line(format!("{}.SetRoutingHelper(list_routing)", stack));
            }
            RoutingMode::Manual => {
                w.line(format!("{}.SetRoutingHelper(ns.Ipv4StaticRoutingHelper())", stack));
            }
        }
        w.line(format!("{} = ns.NodeContainer()", container));
        for index in members {
            w.line(format!("{}.Add(nodes.Get({}))", container, index));
        }
        w.line(format!("{}.Install({})", stack, container));
        w.blank();
    }
}

fn emit_bridges(ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
    let bridges: Vec<_> = ctx
        .model()
        .nodes()
        .enumerate()
        .filter(|(_, n)| n.kind().is_bridge())
        .collect();
    if bridges.is_empty() {
        return;
    }
    w.line("bridge = ns.BridgeHelper()");
    for (index, node) in bridges {
        let mut devices: Vec<_> = node
            .connected_ports()
            .filter_map(|p| ctx.attachment(Endpoint::new(node.id(), p.index)))
            .collect();
        devices.sort_by_key(|a| (a.link_index, a.side));
        w.comment(format!("[bridge {}] id={} name={}", index, node.id(), node.name));
        if devices.is_empty() {
            w.comment("no connected ports; nothing to bridge");
            continue;
        }
        let container = format!("switch{}_devices", index);
        w.line(format!("{} = ns.NetDeviceContainer()", container));
        for attachment in devices {
            w.line(format!("{}.Add({})", container, attachment.device()));
        }
        w.line(format!("bridge.Install(nodes.Get({}), {})", index, container));
    }
    w.blank();
}

fn emit_bindings(ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
    for (index, _) in ctx.ip_nodes() {
        w.line(format!("ipv4_{} = nodes.Get({}).GetObject[ns.Ipv4]()", index, index));
    }
    for plan in &ctx.channels {
        for endpoint in plan.link.endpoints() {
            let Some(attachment) = ctx.attachment(endpoint) else {
                continue;
            };
            let (Some(if_index), Some(node_index)) = (attachment.if_index, ctx.node_index(endpoint.node)) else {
                continue;
            };
            let Some(address) = ctx.model().port(endpoint).and_then(|p| p.address) else {
                continue;
            };
            let ipv4 = format!("ipv4_{}", node_index);
            w.comment(format!("{} -> interface {} ({}/{})", endpoint, if_index, address.ip, address.prefix_len));
            w.line(format!("iface = {}.AddInterface({})", ipv4, attachment.device()));
            w.line(format!(
                "{}.AddAddress(iface, ns.Ipv4InterfaceAddress(ns.Ipv4Address('{}'), ns.Ipv4Mask('{}')))",
                ipv4,
                address.ip,
                netmask(address.prefix_len)
            ));
            w.line(format!("{}.SetMetric(iface, 1)", ipv4));
            w.line(format!("{}.SetUp(iface)", ipv4));
            let enabled = ctx.model().port(endpoint).map(|p| p.enabled).unwrap_or(true);
            if !enabled {
                w.comment(format!("{} is administratively disabled", endpoint));
                w.line(format!("{}.SetDown(iface)", ipv4));
            }
        }
    }
    w.blank();
}
