//! ns-3 program generation.
//!
//! This module turns a [`ModelSnapshot`] into the source of a Python program
//! for ns-3's Python bindings. Generation is pure and deterministic: every
//! check runs before the first line is written, and an unchanged snapshot
//! always yields byte-identical text.
//!
//! The program is a fixed sequence of [`Section`]s, each opened by a
//! `# ==== [SECTION:<name>] ====` marker.

pub mod addressing;
pub mod applications;
pub mod channels;
pub mod context;
pub mod failures;
pub mod header;
pub mod nodes;
pub mod routing;
pub mod run_control;
pub mod writer;

use log::{debug, info};
use std::path::PathBuf;

use crate::error::Result;
use crate::project::ModelSnapshot;

pub use channels::{channel_mapping, ChannelMapping, Construct};
pub use context::EmitContext;
pub use writer::ScriptWriter;

/// Program sections in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    Nodes,
    Channels,
    Addressing,
    Routing,
    Applications,
    Failures,
    Run,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::Header,
        Section::Nodes,
        Section::Channels,
        Section::Addressing,
        Section::Routing,
        Section::Applications,
        Section::Failures,
        Section::Run,
    ];

    /// Name used in the section marker
    pub fn name(self) -> &'static str {
        match self {
            Section::Header => "header",
            Section::Nodes => "nodes",
            Section::Channels => "channels",
            Section::Addressing => "addressing",
            Section::Routing => "routing",
            Section::Applications => "applications",
            Section::Failures => "failures",
            Section::Run => "run",
        }
    }

    /// Marker line opening the section
    pub fn marker(self) -> String {
        format!("# ==== [SECTION:{}] ====", self.name())
    }

    fn emit(self, ctx: &EmitContext<'_>, w: &mut ScriptWriter) {
        match self {
            Section::Header => header::emit(ctx, w),
            Section::Nodes => nodes::emit(ctx, w),
            Section::Channels => channels::emit(ctx, w),
            Section::Addressing => addressing::emit(ctx, w),
            Section::Routing => routing::emit(ctx, w),
            Section::Applications => applications::emit(ctx, w),
            Section::Failures => failures::emit(ctx, w),
            Section::Run => run_control::emit(ctx, w),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Emit the failure-injection section when the snapshot has a scenario
    pub include_failures: bool,
    /// Print per-flow statistics after the run; needs the flow monitor
    pub console_stats: bool,
    /// Print a `PKT|` line for every device transmit, receive and drop
    pub packet_trace: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            include_failures: true,
            console_stats: true,
            packet_trace: false,
        }
    }
}

/// A complete program and what it was generated from
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedScript {
    pub text: String,
    /// Topology generation of the source snapshot
    pub generation: u64,
    /// Project revision of the source snapshot
    pub revision: u64,
    /// Flow statistics file the program writes, if the monitor is enabled
    pub results_path: Option<PathBuf>,
}

impl GeneratedScript {
    /// Text of one section, without its marker; `None` if it was not emitted
    pub fn section(&self, section: Section) -> Option<&str> {
        let marker = section.marker();
        let start = self.text.find(&marker)? + marker.len();
        let rest = &self.text[start..];
        let end = rest.find("# ==== [SECTION:").unwrap_or(rest.len());
        Some(&rest[..end])
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptGenerator {
    options: GeneratorOptions,
}

impl ScriptGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Generate the whole program. Nothing is produced if any check fails.
    pub fn generate(&self, snapshot: &ModelSnapshot) -> Result<GeneratedScript> {
        let ctx = EmitContext::build(snapshot, &self.options)?;
        let mut w = ScriptWriter::new();
        for section in Section::ALL {
            if section == Section::Failures && ctx.schedule.is_none() {
                debug!("No failure effects scheduled; skipping failure section");
                continue;
            }
            section.emit(&ctx, &mut w);
        }
        let text = w.into_string();
        info!(
            "Generated {} line(s) for {} node(s), {} link(s), {} flow(s)",
            text.lines().count(),
            snapshot.topology().node_count(),
            snapshot.topology().link_count(),
            snapshot.flows().len()
        );
        let general = snapshot.general();
        Ok(GeneratedScript {
            text,
            generation: snapshot.generation(),
            revision: snapshot.revision(),
            results_path: general.flow_monitor.then(|| general.results_path()),
        })
    }

    /// Render a single section on its own, indented as inside `main()`
    pub fn render_section(&self, snapshot: &ModelSnapshot, section: Section) -> Result<String> {
        let ctx = EmitContext::build(snapshot, &self.options)?;
        let mut w = ScriptWriter::new();
        if section != Section::Header {
            w.indent();
        }
        section.emit(&ctx, &mut w);
        Ok(w.into_string())
    }
}

/// Generate with `options`
pub fn generate(snapshot: &ModelSnapshot, options: &GeneratorOptions) -> Result<GeneratedScript> {
    ScriptGenerator::new(options.clone()).generate(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ModelError, Violation};
    use crate::failure::{EventKind, EventTarget, FailureEvent, FailureScenario};
    use crate::ip::AddressPolicy;
    use crate::project::Project;
    use crate::routing::{RouteEntry, RoutingMode};
    use crate::topology::{LinkId, LinkKind, LinkSpec, NodeAttrs, NodeId, NodeKind};
    use crate::traffic::{ApplicationKind, FlowId, TrafficFlow};

    /// h1 --fiber-- h2 with one echo flow
    fn fiber_pair() -> (Project, LinkId) {
        let mut project = Project::default();
        let h1 = project.topology.add_node(NodeKind::Host, NodeAttrs::named("h1"));
        let h2 = project.topology.add_node(NodeKind::Host, NodeAttrs::named("h2"));
        let link = project.topology.add_link(h1, 0, h2, 0, LinkKind::Fiber, LinkSpec::default()).unwrap();
        project.topology.assign_addresses(&AddressPolicy::default()).unwrap();
        project.topology.compute_routes();
        project.add_flow(TrafficFlow::new(FlowId(0), h1, h2, ApplicationKind::Echo).with_window(1.0, 9.0));
        (project, link)
    }

    fn count(text: &str, needle: &str) -> usize {
        text.matches(needle).count()
    }

    #[test]
    fn test_fiber_pair_sections() {
        let (project, _) = fiber_pair();
        let script = generate(&project.snapshot(), &GeneratorOptions::default()).unwrap();

        let nodes = script.section(Section::Nodes).unwrap();
        assert_eq!(count(nodes, "# [node "), 2);
        let channels = script.section(Section::Channels).unwrap();
        assert_eq!(count(channels, "# [link "), 1);
        assert!(channels.contains("construct=point-to-point"));
        assert!(channels.contains("p2p.SetDeviceAttribute('DataRate', ns.StringValue('1Gbps'))"));
        assert!(channels.contains("p2p.SetChannelAttribute('Delay', ns.StringValue('0.1ms'))"));

        let apps = script.section(Section::Applications).unwrap();
        assert_eq!(count(apps, "# [flow "), 1);
        assert_eq!(count(apps, "ns.UdpEchoClientHelper("), 1);
        assert!(apps.contains("client_1_apps.Start(ns.Seconds(1.0))"));
        assert!(apps.contains("client_1_apps.Stop(ns.Seconds(9.0))"));
        assert!(script.section(Section::Failures).is_none());
        assert_eq!(script.results_path, Some(PathBuf::from("ns3_output/flowmon-results.xml")));
    }

    #[test]
    fn test_sections_appear_in_order() {
        let (mut project, link) = fiber_pair();
        let mut scenario = FailureScenario::new("cut");
        scenario.add_event(FailureEvent::new(EventKind::LinkDown, EventTarget::Link { link }, 5.0, 2.0));
        project.set_scenario(Some(scenario));
        let script = generate(&project.snapshot(), &GeneratorOptions::default()).unwrap();

        let positions: Vec<usize> = Section::ALL
            .iter()
            .map(|s| script.text.find(&s.marker()).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(script.text.starts_with("#!/usr/bin/env python3\n"));
        assert!(script.text.ends_with("if __name__ == '__main__':\n    sys.exit(main())\n"));
    }

    #[test]
    fn test_link_down_callbacks() {
        let (mut project, link) = fiber_pair();
        let mut scenario = FailureScenario::new("cut");
        scenario.add_event(FailureEvent::new(EventKind::LinkDown, EventTarget::Link { link }, 10.0, 5.0));
        project.set_scenario(Some(scenario));
        project.general.duration = 20.0;

        let script = generate(&project.snapshot(), &GeneratorOptions::default()).unwrap();
        let failures = script.section(Section::Failures).unwrap();
        assert!(failures.contains("def failure_0_apply():"));
        assert!(failures.contains("def failure_0_revert():"));
        assert!(failures.contains("ns.Simulator.Schedule(ns.Seconds(10.0), failure_0_apply)"));
        assert!(failures.contains("ns.Simulator.Schedule(ns.Seconds(15.0), failure_0_revert)"));
        assert!(failures.contains("set_receive_errors(devices0.Get(0), 'ERROR_UNIT_PACKET', 1.0)"));
        assert!(failures.contains("ipv4_1.SetDown(1)"));
        // fiber BER comes back on enable
        assert!(failures.contains("set_receive_errors(devices0.Get(1), 'ERROR_UNIT_BIT', 0.000000000001)"));
        assert!(script.text.contains("RespondToInterfaceEvents"));

        let options = GeneratorOptions { include_failures: false, ..GeneratorOptions::default() };
        let quiet = generate(&project.snapshot(), &options).unwrap();
        assert!(quiet.section(Section::Failures).is_none());
        assert!(!quiet.text.contains("RespondToInterfaceEvents"));
    }

    #[test]
    fn test_satellite_falls_back_with_marker() {
        let mut project = Project::default();
        let a = project.topology.add_node(NodeKind::ControlCenter, NodeAttrs::named("cc"));
        let b = project.topology.add_node(NodeKind::Rtu, NodeAttrs::named("rtu"));
        project.topology.add_link(a, 0, b, 0, LinkKind::SatelliteGeo, LinkSpec::default()).unwrap();
        project.topology.assign_addresses(&AddressPolicy::default()).unwrap();

        let script = generate(&project.snapshot(), &GeneratorOptions::default()).unwrap();
        let channels = script.section(Section::Channels).unwrap();
        assert!(channels.contains("kind=SATELLITE_GEO construct=point-to-point"));
        assert!(channels.contains("# [substitution] link=l1 kind=SATELLITE_GEO"));
        assert!(channels.contains("ns.StringValue('270ms')"));
    }

    #[test]
    fn test_validation_runs_before_any_text() {
        let (mut project, _) = fiber_pair();
        project.add_flow(TrafficFlow::new(FlowId(0), NodeId(1), NodeId(42), ApplicationKind::Echo));
        let err = generate(&project.snapshot(), &GeneratorOptions::default()).unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidTopology {
                violations: vec![Violation::FlowEndpointMissing { flow: FlowId(2), field: "target", node: NodeId(42) }],
            }
        );
    }

    #[test]
    fn test_manual_node_gets_static_routes_only() {
        let mut project = Project::default();
        let h1 = project.topology.add_node(NodeKind::Host, NodeAttrs::named("h1"));
        let r1 = project.topology.add_node(NodeKind::Router, NodeAttrs::named("r1"));
        let h2 = project.topology.add_node(NodeKind::Host, NodeAttrs::named("h2"));
        project.topology.add_link(h1, 0, r1, 0, LinkKind::PointToPoint, LinkSpec::default()).unwrap();
        project.topology.add_link(r1, 1, h2, 0, LinkKind::PointToPoint, LinkSpec::default()).unwrap();
        project.topology.assign_addresses(&AddressPolicy::default()).unwrap();
        let gateway = project.topology.node(r1).unwrap().port(0).unwrap().address.unwrap().ip;
        let table = project.topology.routing_table_mut(h1).unwrap();
        table.mode = RoutingMode::Manual;
        table.add_manual(RouteEntry::default_route(gateway, 0));

        let script = generate(&project.snapshot(), &GeneratorOptions::default()).unwrap();
        let addressing = script.section(Section::Addressing).unwrap();
        assert!(addressing.contains("manual_nodes.Add(nodes.Get(0))"));
        assert!(!addressing.contains("auto_nodes.Add(nodes.Get(0))"));
        let routing = script.section(Section::Routing).unwrap();
        assert!(routing.contains("ns.Ipv4GlobalRoutingHelper.PopulateRoutingTables()"));
        assert!(routing.contains(&format!("static_0.SetDefaultRoute(ns.Ipv4Address('{}'), 1, 0)", gateway)));
    }

    #[test]
    fn test_render_single_section() {
        let (project, _) = fiber_pair();
        let generator = ScriptGenerator::default();
        let nodes = generator.render_section(&project.snapshot(), Section::Nodes).unwrap();
        assert!(nodes.starts_with("    # ==== [SECTION:nodes] ====\n"));
        assert!(nodes.contains("ns.Names.Add('n1', nodes.Get(0))"));
    }

    #[test]
    fn test_failover_block_orders_by_priority() {
        let mut project = Project::default();
        let backup = project.topology.add_node(NodeKind::BackupControlCenter, NodeAttrs::named("backup-cc"));
        let hub = project.topology.add_node(NodeKind::Router, NodeAttrs::named("hub"));
        let primary = project.topology.add_node(NodeKind::ControlCenter, NodeAttrs::named("primary-cc"));
        let rtu = project.topology.add_node(NodeKind::Rtu, NodeAttrs::named("rtu"));
        project.topology.add_link(primary, 0, hub, 0, LinkKind::Fiber, LinkSpec::default()).unwrap();
        project.topology.add_link(backup, 0, hub, 1, LinkKind::Microwave, LinkSpec::default()).unwrap();
        project.topology.add_link(rtu, 0, hub, 2, LinkKind::Fiber, LinkSpec::default()).unwrap();
        project.topology.assign_addresses(&AddressPolicy::default()).unwrap();

        let script = generate(&project.snapshot(), &GeneratorOptions::default()).unwrap();
        let nodes = script.section(Section::Nodes).unwrap();
        assert!(nodes.contains("# [failover] lower priority takes over first"));
        let first = nodes
            .find(&format!("# [failover 1] id={} name=primary-cc kind=CONTROL_CENTER priority=1 role=primary", primary))
            .unwrap();
        let second = nodes
            .find(&format!(
                "# [failover 2] id={} name=backup-cc kind=BACKUP_CONTROL_CENTER priority=2 role=backup",
                backup
            ))
            .unwrap();
        assert!(first < second);
        assert!(!nodes.contains("name=rtu kind=RTU priority"));
        assert!(!nodes.contains("[failover 3]"));

        let (plain, _) = fiber_pair();
        let script = generate(&plain.snapshot(), &GeneratorOptions::default()).unwrap();
        assert!(!script.section(Section::Nodes).unwrap().contains("[failover"));
    }

    #[test]
    fn test_console_stats_follow_options() {
        let (project, _) = fiber_pair();
        let script = generate(&project.snapshot(), &GeneratorOptions::default()).unwrap();
        let run = script.section(Section::Run).unwrap();
        assert!(run.contains("for flow_id, stats in monitor.GetFlowStats():"));
        assert!(run.contains("Mean Delay"));
        assert!(run.contains("Throughput"));
        assert!(run.find("ns.Simulator.Run()").unwrap() < run.find("GetFlowStats").unwrap());

        let options = GeneratorOptions { console_stats: false, ..GeneratorOptions::default() };
        let quiet = generate(&project.snapshot(), &options).unwrap();
        assert!(!quiet.text.contains("GetFlowStats"));

        let mut unmonitored = project.clone();
        unmonitored.general.flow_monitor = false;
        let script = generate(&unmonitored.snapshot(), &GeneratorOptions::default()).unwrap();
        assert!(!script.text.contains("GetFlowStats"));
    }

    #[test]
    fn test_packet_trace_is_opt_in() {
        let (project, _) = fiber_pair();
        let script = generate(&project.snapshot(), &GeneratorOptions::default()).unwrap();
        assert!(!script.text.contains("trace_packet"));

        let options = GeneratorOptions { packet_trace: true, ..GeneratorOptions::default() };
        let script = generate(&project.snapshot(), &options).unwrap();
        let run = script.section(Section::Run).unwrap();
        assert!(run.contains("def trace_packet(event, context, packet):"));
        assert!(run.contains("PKT|"));
        assert!(run.contains("$ns3::PointToPointNetDevice/MacTx"));
        assert!(run.contains("trace_packet('DROP', context, packet)"));
        assert!(!run.contains("CsmaNetDevice"));
        assert!(run.find("trace_packet").unwrap() < run.find("ns.Simulator.Run()").unwrap());
    }

    #[test]
    fn test_degrade_error_rate_uses_bit_unit() {
        let (mut project, link) = fiber_pair();
        let mut scenario = FailureScenario::new("noisy");
        let mut degraded = FailureEvent::new(EventKind::LinkDegraded, EventTarget::Link { link }, 2.0, 1.0);
        degraded.params.error_rate = Some(0.001);
        scenario.add_event(degraded);
        project.set_scenario(Some(scenario));

        let script = generate(&project.snapshot(), &GeneratorOptions::default()).unwrap();
        let failures = script.section(Section::Failures).unwrap();
        assert!(failures.contains("set_receive_errors(devices0.Get(0), 'ERROR_UNIT_BIT', 0.001)"));
    }
}
