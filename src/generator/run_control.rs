//! Stop time, measurement collection, the run call and teardown.

use super::channels::Construct;
use super::context::EmitContext;
use super::writer::{py_float, py_str, ScriptWriter};

pub fn emit(ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
    let general = ctx.snapshot.general();
    let output_dir = general.output_dir.to_string_lossy();
    w.section("run");
    w.line(format!("ns.Simulator.Stop(ns.Seconds({}))", py_float(general.duration)));

    if general.flow_monitor {
        w.line("flowmon_helper = ns.FlowMonitorHelper()");
        w.line("monitor = flowmon_helper.InstallAll()");
    }

    let constructs: Vec<Construct> = [Construct::PointToPoint, Construct::Csma]
        .into_iter()
        .filter(|c| ctx.channels.iter().any(|plan| plan.construct == *c))
        .collect();
    if general.pcap {
        for construct in &constructs {
            let prefix = general.output_dir.join(construct.helper());
            w.line(format!("{}.EnablePcapAll({})", construct.helper(), py_str(&prefix.to_string_lossy())));
        }
    }
    if general.ascii_trace && !constructs.is_empty() {
        w.line("ascii = ns.AsciiTraceHelper()");
        for construct in &constructs {
            let file = general.output_dir.join(format!("{}.tr", construct.helper()));
            w.line(format!(
                "{}.EnableAsciiAll(ascii.CreateFileStream({}))",
                construct.helper(),
                py_str(&file.to_string_lossy())
            ));
        }
    }

    if ctx.options.packet_trace && !constructs.is_empty() {
        emit_packet_trace(&constructs, w);
    }

    w.blank();
    w.line("ns.Simulator.Run()");
    if general.flow_monitor {
        w.line("monitor.CheckForLostPackets()");
        if ctx.options.console_stats {
            emit_console_stats(w);
        }
        w.line(format!(
            "monitor.SerializeToXmlFile({}, True, True)",
            py_str(&general.results_path().to_string_lossy())
        ));
        w.line(format!("print('Flow statistics written to ' + {})", py_str(&output_dir)));
    }
    w.line("ns.Simulator.Destroy()");
    w.line("return 0");
    w.dedent();
    w.blank();
    w.blank();
    w.line("if __name__ == '__main__':");
    w.block(|w| w.line("sys.exit(main())"));
}

/// Device trace sources hooked for `PKT|` lines, per event label
const PACKET_TRACE_SOURCES: [(&str, &str); 3] = [("TX", "MacTx"), ("RX", "MacRx"), ("DROP", "PhyRxDrop")];

/// Print one `PKT|time_ns|event|node|device|size` line per device event
fn emit_packet_trace(constructs: &[Construct], w: &mut ScriptWriter) {
    w.line("def trace_packet(event, context, packet):");
    w.block(|w| {
        w.line("parts = context.split('/')");
        w.line("node = int(parts[2]) if len(parts) > 2 else -1");
        w.line("device = int(parts[4]) if len(parts) > 4 else -1");
        w.line("now = ns.Simulator.Now().GetNanoSeconds()");
        w.line("print(f'PKT|{now}|{event}|{node}|{device}|{packet.GetSize()}')");
    });
    for construct in constructs {
        for (event, source) in PACKET_TRACE_SOURCES {
            let callback = format!("lambda context, packet: trace_packet('{}', context, packet)", event);
            w.line(format!(
                "ns.Config.Connect('/NodeList/*/DeviceList/*/$ns3::{}/{}', ns.MakeCallback({}))",
                construct.device_type(),
                source,
                callback
            ));
        }
    }
}

/// Per-flow summary printed once the run finishes
fn emit_console_stats(w: &mut ScriptWriter) {
    w.line("classifier = flowmon_helper.GetClassifier()");
    w.line("print('Flow statistics:')");
    w.line("for flow_id, stats in monitor.GetFlowStats():");
    w.block(|w| {
        w.line("t = classifier.FindFlow(flow_id)");
        w.line("print(f'Flow {flow_id} {t.sourceAddress}:{t.sourcePort} -> {t.destinationAddress}:{t.destinationPort}')");
        w.line("print(f'  Tx Packets: {stats.txPackets}')");
        w.line("print(f'  Rx Packets: {stats.rxPackets}')");
        w.line("lost = stats.txPackets - stats.rxPackets");
        w.line("if stats.txPackets > 0:");
        w.block(|w| w.line("print(f'  Lost Packets: {lost} ({lost / stats.txPackets * 100:.1f}%)')"));
        w.line("if stats.rxPackets > 0:");
        w.block(|w| {
            w.line("active = stats.timeLastRxPacket.GetSeconds() - stats.timeFirstTxPacket.GetSeconds()");
            w.line("if active > 0:");
            w.block(|w| w.line("print(f'  Throughput: {stats.rxBytes * 8 / active / 1e6:.3f} Mbps')"));
            w.line("print(f'  Mean Delay: {stats.delaySum.GetSeconds() / stats.rxPackets * 1000:.3f} ms')");
        });
    });
}
