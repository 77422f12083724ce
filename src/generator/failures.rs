//! Failure-injection emission.
//!
//! Each effect pair becomes a `failure_<seq>_apply` callback and, when the
//! pair reverts, a `failure_<seq>_revert` callback. All callbacks are
//! scheduled at the end of the section in timeline order.

use super::channels::Construct;
use super::context::EmitContext;
use super::writer::{py_float, py_str, ScriptWriter};
use crate::failure::{Action, EffectPair, FailureEvent, FailureScenario, Phase};
use crate::topology::{Endpoint, LinkId, NodeId};
use crate::traffic::DEFAULT_PORT;

pub fn emit(ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
    let (Some(schedule), Some(scenario)) = (&ctx.schedule, ctx.snapshot.scenario()) else {
        return;
    };
    w.section("failures");
    w.comment(format!("Scenario: {}", scenario.name));
    if !scenario.description.is_empty() {
        w.comment(&scenario.description);
    }
    w.comment(format!(
        "{} event(s), {} scheduled effect(s)",
        scenario.len(),
        schedule.effect_count()
    ));
    w.line("def set_receive_errors(device, unit, rate):");
    w.block(|w| {
        w.line("model = ns.CreateObject[ns.RateErrorModel]()");
        w.line("model.SetAttribute('ErrorUnit', ns.StringValue(unit))");
        w.line("model.SetAttribute('ErrorRate', ns.DoubleValue(rate))");
        w.line("device.SetAttribute('ReceiveErrorModel', ns.PointerValue(model))");
    });
    w.blank();

    for (seq, pair) in schedule.pairs.iter().enumerate() {
        let Ok(event) = scenario.event(pair.event) else {
            continue;
        };
        emit_pair(ctx, scenario, event, seq, pair, w);
    }

    w.comment("schedule");
    for effect in schedule.timeline() {
        let phase = match effect.phase {
            Phase::Apply => "apply",
            Phase::Revert => "revert",
        };
        w.line(format!(
            "ns.Simulator.Schedule(ns.Seconds({}), failure_{}_{})",
            py_float(effect.at),
            effect.pair,
            phase
        ));
    }
    w.blank();
}

fn emit_pair(
    ctx: &EmitContext<'_>,
    scenario: &FailureScenario,
    event: &FailureEvent,
    seq: usize,
    pair: &EffectPair,
    w: &mut ScriptWriter,
) {
    let mut tag = format!(
        "[failure {}] event={} kind={} target={} {}",
        seq,
        event.id(),
        event.kind,
        event.target.label(),
        event.target
    );
    if let Some(cycle) = pair.cycle {
        tag.push_str(&format!(" cycle={}", cycle));
    }
    w.comment(tag);
    w.comment(format!("{} ({:?}, severity {})", event.label(), event.category, event.severity.level()));
    if let Some(cause) = event.caused_by() {
        let name = scenario.event(cause).map(|c| c.label()).unwrap_or_default();
        w.comment(format!("cascade: caused by {} ({})", cause, name));
    }
    if !event.causes().is_empty() {
        let effects: Vec<String> = event.causes().iter().map(|e| e.to_string()).collect();
        w.comment(format!("cascade: causes {}", effects.join(", ")));
    }

    if let Action::StartFlood { source, target, rate_pps, packet_size } = &pair.apply.action {
        let stop = pair
            .revert
            .as_ref()
            .map(|r| r.at)
            .unwrap_or(ctx.snapshot.general().duration);
        emit_flood(ctx, seq, (*source, *target), *rate_pps, *packet_size, (pair.apply.at, stop), w);
    }

    emit_callback(ctx, seq, "apply", event, &pair.apply.action, w);
    if let Some(revert) = &pair.revert {
        emit_callback(ctx, seq, "revert", event, &revert.action, w);
    }
    w.blank();
}

fn emit_callback(
    ctx: &EmitContext<'_>,
    seq: usize,
    phase: &str,
    event: &FailureEvent,
    action: &Action,
    w: &mut ScriptWriter,
) {
    w.line(format!("def failure_{}_{}():", seq, phase));
    w.block(|w| {
        let message = format!("{} {} {} {}", event.id(), event.kind, phase, action.label());
        w.line(format!(
            "print(f'[{{ns.Simulator.Now().GetSeconds():.3f}}s] ' + {})",
            py_str(&message)
        ));
        match action {
            Action::DisablePorts(ports) => {
                for endpoint in ports {
                    emit_port(ctx, *endpoint, false, w);
                }
            }
            Action::EnablePorts(ports) => {
                for endpoint in ports {
                    emit_port(ctx, *endpoint, true, w);
                }
            }
            Action::Degrade { link, data_rate, delay, error_rate } => {
                emit_link_params(
                    ctx,
                    *link,
                    data_rate.map(|r| r.to_string()),
                    delay.map(|d| d.to_string()),
                    *error_rate,
                    w,
                );
            }
            Action::Restore { link } => {
                if let Some(plan) = ctx.channel(*link) {
                    let params = &plan.link.params;
                    emit_link_params(
                        ctx,
                        *link,
                        Some(params.data_rate.to_string()),
                        Some(params.delay.to_string()),
                        Some(params.bit_error_rate),
                        w,
                    );
                }
            }
            Action::StartFlood { .. } | Action::StopFlood { .. } => {
                w.comment(format!("flood_{}_apps runs on its own start/stop times", seq));
            }
        }
    });
}

/// Cut a port with a drop-everything error model, or bring it back
fn emit_port(ctx: &EmitContext<'_>, endpoint: Endpoint, up: bool, w: &mut ScriptWriter) {
    let Some(attachment) = ctx.attachment(endpoint) else {
        w.comment(format!("{} is not connected", endpoint));
        return;
    };
    let device = attachment.device();
    let ber = ctx
        .channels
        .get(attachment.link_index)
        .map(|c| c.link.params.bit_error_rate)
        .unwrap_or(0.0);
    if !up {
        w.line(format!("set_receive_errors({}, 'ERROR_UNIT_PACKET', 1.0)", device));
    } else if ber > 0.0 {
        w.line(format!("set_receive_errors({}, 'ERROR_UNIT_BIT', {})", device, py_float(ber)));
    } else {
        w.line(format!("set_receive_errors({}, 'ERROR_UNIT_PACKET', 0.0)", device));
    }
    if let (Some(if_index), Some(node)) = (attachment.if_index, ctx.node_index(endpoint.node)) {
        let call = if up { "SetUp" } else { "SetDown" };
        w.line(format!("ipv4_{}.{}({})", node, call, if_index));
    }
}

fn emit_link_params(
    ctx: &EmitContext<'_>,
    link: LinkId,
    data_rate: Option<String>,
    delay: Option<String>,
    error_rate: Option<f64>,
    w: &mut ScriptWriter,
) {
    let Some(plan) = ctx.channel(link) else {
        return;
    };
    let devices = plan.devices();
    if let Some(rate) = data_rate {
        match plan.construct {
            Construct::PointToPoint => {
                for side in 0..2 {
                    w.line(format!("{}.Get({}).SetAttribute('DataRate', ns.StringValue('{}'))", devices, side, rate));
                }
            }
            Construct::Csma => {
                w.line(format!(
                    "{}.Get(0).GetChannel().SetAttribute('DataRate', ns.StringValue('{}'))",
                    devices, rate
                ));
            }
        }
    }
    if let Some(delay) = delay {
        w.line(format!("{}.Get(0).GetChannel().SetAttribute('Delay', ns.StringValue('{}'))", devices, delay));
    }
    if let Some(rate) = error_rate {
        for side in 0..2 {
            w.line(format!(
                "set_receive_errors({}.Get({}), 'ERROR_UNIT_BIT', {})",
                devices,
                side,
                py_float(rate)
            ));
        }
    }
}

/// Constant-rate UDP flood installed up front with the event's window
fn emit_flood(
    ctx: &EmitContext<'_>,
    seq: usize,
    (source, target): (NodeId, NodeId),
    rate_pps: u32,
    packet_size: u32,
    (start, stop): (f64, f64),
    w: &mut ScriptWriter,
) {
    let model = ctx.model();
    let (Some(src), Some(address)) = (
        ctx.node_index(source),
        model.node(target).ok().and_then(|n| n.primary_address()),
    ) else {
        w.comment(format!("flood target {} has no address; nothing to install", target));
        return;
    };
    let helper = format!("flood_{}", seq);
    let bps = u64::from(rate_pps) * u64::from(packet_size) * 8;
    w.line(format!(
        "{} = ns.OnOffHelper('ns3::UdpSocketFactory', ns.InetSocketAddress(ns.Ipv4Address('{}'), {}).ConvertTo())",
        helper, address.ip, DEFAULT_PORT
    ));
    w.line(format!("{}.SetAttribute('DataRate', ns.StringValue('{}bps'))", helper, bps));
    w.line(format!("{}.SetAttribute('PacketSize', ns.UintegerValue({}))", helper, packet_size));
    w.line(format!("{}.SetAttribute('OnTime', ns.StringValue('ns3::ConstantRandomVariable[Constant=1]'))", helper));
    w.line(format!("{}.SetAttribute('OffTime', ns.StringValue('ns3::ConstantRandomVariable[Constant=0]'))", helper));
    w.line(format!("{}_apps = {}.Install(nodes.Get({}))", helper, helper, src));
    w.line(format!("{}_apps.Start(ns.Seconds({}))", helper, py_float(start)));
    w.line(format!("{}_apps.Stop(ns.Seconds({}))", helper, py_float(stop)));
}
