//! Application emission, one block per flow.
//!
//! Receivers (echo servers and packet sinks) run for the whole simulation
//! and are shared by every flow that targets the same node, transport and
//! port.

use log::warn;
use std::collections::BTreeMap;

use super::context::{EmitContext, FlowPlan};
use super::writer::{py_float, py_str, ScriptWriter};
use crate::topology::NodeId;
use crate::traffic::{AppPlan, Protocol};

/// Kind of receiver bound on a (node, transport, port)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Receiver {
    EchoServer,
    PacketSink,
}

type ReceiverKey = (NodeId, &'static str, u16);

pub fn emit(ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
    w.section("applications");
    let mut receivers: BTreeMap<ReceiverKey, (Receiver, u32)> = BTreeMap::new();
    for plan in &ctx.flows {
        emit_flow(ctx, plan, &mut receivers, w);
        w.blank();
    }
}

fn emit_flow(
    ctx: &EmitContext<'_>,
    plan: &FlowPlan<'_>,
    receivers: &mut BTreeMap<ReceiverKey, (Receiver, u32)>,
    w: &mut ScriptWriter,
) {
    let flow = plan.flow;
    let resolved = &plan.resolved;
    let n = flow.id.0;
    w.comment(format!("[flow {}] app={}", flow.id, resolved.strategy));

    let model = ctx.model();
    let (Some(source), Some(target)) = (ctx.node_index(flow.source), ctx.node_index(flow.target)) else {
        return;
    };
    let Some(address) = model.node(flow.target).ok().and_then(|t| t.primary_address()) else {
        return;
    };
    w.comment(format!(
        "{} -> {} ({}) {}/{} window {}-{}s",
        flow.label(),
        flow.target,
        address.ip,
        resolved.protocol,
        resolved.port,
        py_float(plan.start),
        py_float(plan.stop)
    ));
    if let Some(priority) = resolved.priority {
        w.comment(format!("priority={:?} dscp={} ({})", priority, priority.dscp(), priority.phb()));
    }
    if !plan.runs() {
        w.comment("starts after the simulation ends; not installed");
        return;
    }

    let receiver = match resolved.plan {
        AppPlan::Echo { .. } => Some(Receiver::EchoServer),
        AppPlan::OnOff { .. } | AppPlan::Bulk { .. } => Some(Receiver::PacketSink),
        AppPlan::Custom { .. } => None,
    };
    if let Some(kind) = receiver {
        let key = (flow.target, resolved.protocol.socket_factory(), resolved.port);
        match receivers.get(&key) {
            Some((existing, owner)) => {
                if *existing != kind {
                    warn!(
                        "{} needs a {:?} on {}:{} already bound by a {:?} for f{}",
                        flow.id, kind, flow.target, resolved.port, existing, owner
                    );
                }
                w.comment(format!("receiver on {} port {} shared with f{}", flow.target, resolved.port, owner));
            }
            None => {
                emit_receiver(ctx, kind, n, target, resolved.protocol, resolved.port, w);
                receivers.insert(key, (kind, n));
            }
        }
    }

    let remote = format!("ns.Ipv4Address('{}')", address.ip);
    let tos = resolved.tos();
    let app = match &resolved.plan {
        AppPlan::Echo { interval, packet_size, response_size, max_packets } => {
            if let Some(size) = response_size {
                w.comment(format!("outstation answers with {} byte(s)", size));
            }
            let client = format!("client_{}", n);
            w.line(format!("{} = ns.UdpEchoClientHelper({}.ConvertTo(), {})", client, remote, resolved.port));
            w.line(format!("{}.SetAttribute('MaxPackets', ns.UintegerValue({}))", client, max_packets));
            w.line(format!(
                "{}.SetAttribute('Interval', ns.TimeValue(ns.Seconds({})))",
                client,
                py_float(*interval)
            ));
            w.line(format!("{}.SetAttribute('PacketSize', ns.UintegerValue({}))", client, packet_size));
            client
        }
        AppPlan::OnOff { data_rate, packet_size, on_time, off_time, max_bytes } => {
            let onoff = format!("onoff_{}", n);
            w.line(format!(
                "{} = ns.OnOffHelper({}, ns.InetSocketAddress({}, {}).ConvertTo())",
                onoff,
                py_str(resolved.protocol.socket_factory()),
                remote,
                resolved.port
            ));
            w.line(format!("{}.SetAttribute('DataRate', ns.StringValue('{}'))", onoff, data_rate));
            w.line(format!("{}.SetAttribute('PacketSize', ns.UintegerValue({}))", onoff, packet_size));
            w.line(format!(
                "{}.SetAttribute('OnTime', ns.StringValue('ns3::ConstantRandomVariable[Constant={}]'))",
                onoff,
                py_float(*on_time)
            ));
            w.line(format!(
                "{}.SetAttribute('OffTime', ns.StringValue('ns3::ConstantRandomVariable[Constant={}]'))",
                onoff,
                py_float(*off_time)
            ));
            w.line(format!("{}.SetAttribute('MaxBytes', ns.UintegerValue({}))", onoff, max_bytes));
            onoff
        }
        AppPlan::Bulk { packet_size, max_bytes } => {
            let bulk = format!("bulk_{}", n);
            w.line(format!(
                "{} = ns.BulkSendHelper({}, ns.InetSocketAddress({}, {}).ConvertTo())",
                bulk,
                py_str(resolved.protocol.socket_factory()),
                remote,
                resolved.port
            ));
            w.line(format!("{}.SetAttribute('SendSize', ns.UintegerValue({}))", bulk, packet_size));
            w.line(format!("{}.SetAttribute('MaxBytes', ns.UintegerValue({}))", bulk, max_bytes));
            bulk
        }
        AppPlan::Custom { symbol, source_file } => {
            emit_custom(ctx, plan, symbol, &source_file.to_string_lossy(), source, address.ip, w);
            return;
        }
    };

    if let Some(tos) = tos {
        w.line(format!("{}.SetAttribute('Tos', ns.UintegerValue({}))", app, tos));
    }
    let apps = format!("{}_apps", app);
    w.line(format!("{} = {}.Install(nodes.Get({}))", apps, app, source));
    w.line(format!("{}.Start(ns.Seconds({}))", apps, py_float(plan.start)));
    w.line(format!("{}.Stop(ns.Seconds({}))", apps, py_float(plan.stop)));
}

fn emit_receiver(
    ctx: &EmitContext<'_>,
    kind: Receiver,
    n: u32,
    target: usize,
    protocol: Protocol,
    port: u16,
    w: &mut ScriptWriter,
) {
    let (helper, construct) = match kind {
        Receiver::EchoServer => (format!("server_{}", n), format!("ns.UdpEchoServerHelper({})", port)),
        Receiver::PacketSink => (
            format!("sink_{}", n),
            format!(
                "ns.PacketSinkHelper({}, ns.InetSocketAddress(ns.Ipv4Address.GetAny(), {}).ConvertTo())",
                py_str(protocol.socket_factory()),
                port
            ),
        ),
    };
    let apps = format!("{}_apps", helper);
    w.line(format!("{} = {}", helper, construct));
    w.line(format!("{} = {}.Install(nodes.Get({}))", apps, helper, target));
    w.line(format!("{}.Start(ns.Seconds(0.0))", apps));
    w.line(format!("{}.Stop(ns.Seconds({}))", apps, py_float(ctx.snapshot.general().duration)));
}

/// Import the handler module from its file and instantiate the symbol
fn emit_custom(
    ctx: &EmitContext<'_>,
    plan: &FlowPlan<'_>,
    symbol: &str,
    source_file: &str,
    source: usize,
    target_ip: std::net::Ipv4Addr,
    w: &mut ScriptWriter,
) {
    let flow = plan.flow;
    let n = flow.id.0;
    let model = ctx.model();
    let name_of = |id| model.node(id).map(|node| node.name.clone()).unwrap_or_default();
    let spec = format!("handler_spec_{}", n);
    let module = format!("handler_module_{}", n);

    w.comment(format!("handler {} from {}", symbol, source_file));
    w.line(format!(
        "{} = importlib.util.spec_from_file_location({}, {})",
        spec,
        py_str(&format!("gridnetsim_handler_{}", n)),
        py_str(source_file)
    ));
    w.line(format!("{} = importlib.util.module_from_spec({})", module, spec));
    w.line(format!("{}.loader.exec_module({})", spec, module));
    w.line(format!("handler_{} = {}.{}(", n, module, symbol));
    w.block(|w| {
        w.line(format!("node=nodes.Get({}),", source));
        w.line(format!("target_address='{}',", target_ip));
        w.line(format!("target_port={},", plan.resolved.port));
        w.line(format!("protocol={},", py_str(&plan.resolved.protocol.to_string().to_uppercase())));
        w.line(format!("start_time={},", py_float(plan.start)));
        w.line(format!("stop_time={},", py_float(plan.stop)));
        w.line(format!("send_interval={},", py_float(flow.params.interval)));
        w.line(format!("packet_size={},", flow.params.packet_size));
        w.line(format!("app_name={},", py_str(&flow.label())));
        w.line(format!("source_node_name={},", py_str(&name_of(flow.source))));
        w.line(format!("target_node_name={},", py_str(&name_of(flow.target))));
    });
    w.line(")");
}
