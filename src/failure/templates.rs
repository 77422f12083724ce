//! Ready-made failure scenarios.

use log::info;

use super::scenario::FailureScenario;
use super::types::{EventKind, EventParams, EventTarget, FailureCategory, FailureEvent, Severity};
use crate::error::Result;
use crate::topology::{LinkId, NodeId, NodeKind, TopologyModel};

/// One link goes down at `at` for `duration` seconds
pub fn single_link_failure(link: LinkId, at: f64, duration: f64) -> FailureScenario {
    let mut scenario = FailureScenario::new(format!("Single link failure ({})", link))
        .with_description(format!("Link {} fails at t={}s", link, at));
    scenario.category = FailureCategory::Equipment;
    scenario.severity = Severity::High;
    scenario.add_event(
        FailureEvent::new(EventKind::LinkDown, EventTarget::Link { link }, at, duration).named(format!("{} down", link)),
    );
    scenario
}

pub fn node_power_loss(node: NodeId, at: f64, duration: f64) -> FailureScenario {
    let mut scenario = FailureScenario::new(format!("Power loss ({})", node))
        .with_description(format!("Node {} loses power at t={}s", node, at));
    scenario.category = FailureCategory::Natural;
    scenario.severity = Severity::High;
    scenario.add_event(
        FailureEvent::new(EventKind::NodePowerLoss, EventTarget::Node { node }, at, duration)
            .named(format!("{} power loss", node)),
    );
    scenario
}

/// `initial` loses power, then each follower `step` seconds after the one before it.
///
/// Every follower is cascade-linked to its predecessor.
pub fn cascading_failure(initial: NodeId, followers: &[NodeId], start: f64, step: f64, duration: f64) -> FailureScenario {
    let mut scenario = FailureScenario::new(format!("Cascading failure from {}", initial))
        .with_description(format!("{} node(s) fail in sequence every {}s", followers.len() + 1, step));
    scenario.category = FailureCategory::Cascading;
    scenario.severity = Severity::Critical;

    let mut previous = scenario.add_event(
        FailureEvent::new(EventKind::NodePowerLoss, EventTarget::Node { node: initial }, start, duration)
            .named(format!("initial failure {}", initial))
            .with_category(FailureCategory::Cascading, Severity::Critical),
    );
    for (i, node) in followers.iter().enumerate() {
        let at = start + step * (i as f64 + 1.0);
        let next = scenario.add_event(
            FailureEvent::new(EventKind::NodePowerLoss, EventTarget::Node { node: *node }, at, duration)
                .named(format!("cascade {} {}", i + 1, node))
                .with_category(FailureCategory::Cascading, Severity::High),
        );
        // both ids were just added and cannot form a cycle
        if scenario.link_cascade(previous, next).is_ok() {
            previous = next;
        }
    }
    scenario
}

pub fn network_partition(a: Vec<NodeId>, b: Vec<NodeId>, at: f64, duration: f64) -> FailureScenario {
    let mut scenario = FailureScenario::new("Network partition")
        .with_description(format!("{} node(s) cut off from {} node(s)", a.len(), b.len()));
    scenario.severity = Severity::Critical;
    scenario.add_event(
        FailureEvent::new(EventKind::NetworkPartition, EventTarget::Groups { a, b }, at, duration).named("partition"),
    );
    scenario
}

/// Primary control center loses power for good; backups take over.
///
/// Backup links that protect a link of the primary are brought up at the
/// same instant. The takeover order (by failover priority) is recorded in
/// the scenario description.
pub fn control_center_failover(model: &TopologyModel, primary: NodeId, at: f64) -> Result<FailureScenario> {
    let cc = model.node(primary)?;

    let mut backups: Vec<(u8, NodeId, &str)> = model
        .nodes()
        .filter(|n| n.id() != primary)
        .filter(|n| n.kind() == NodeKind::BackupControlCenter || n.grid.as_ref().is_some_and(|g| g.is_backup))
        .map(|n| (n.grid.as_ref().map(|g| g.failover_priority).unwrap_or(u8::MAX), n.id(), n.name.as_str()))
        .collect();
    backups.sort();
    let order = backups
        .iter()
        .map(|(priority, id, name)| format!("{} {} (priority {})", id, name, priority))
        .collect::<Vec<_>>()
        .join(", ");

    let mut scenario = FailureScenario::new(format!("Control center failover ({})", cc.name)).with_description(
        if order.is_empty() {
            format!("{} fails with no backup control center in the topology", cc.name)
        } else {
            format!("{} fails; takeover order: {}", cc.name, order)
        },
    );
    scenario.category = FailureCategory::Equipment;
    scenario.severity = Severity::Critical;

    let outage = scenario.add_event(
        FailureEvent::new(EventKind::NodePowerLoss, EventTarget::Node { node: primary }, at, -1.0)
            .named(format!("{} outage", cc.name))
            .with_category(FailureCategory::Equipment, Severity::Critical),
    );

    let primary_links = model.links_of(primary);
    for link in model.links() {
        let protects = link.redundancy.is_backup
            && link.redundancy.backs_up.is_some_and(|primary_link| primary_links.contains(&primary_link));
        if protects {
            let activation = scenario.add_event(
                FailureEvent::new(EventKind::LinkUp, EventTarget::Link { link: link.id() }, at, -1.0)
                    .named(format!("backup {} activation", link.id())),
            );
            scenario.link_cascade(outage, activation)?;
        }
    }
    info!("Built failover scenario for {} with {} backup(s)", primary, backups.len());
    Ok(scenario)
}

/// `attacker` floods `victim` with small packets
pub fn dos_attack(attacker: NodeId, victim: NodeId, at: f64, duration: f64, rate_pps: u32) -> FailureScenario {
    let mut scenario = FailureScenario::new(format!("DoS attack on {}", victim))
        .with_description(format!("{} floods {} at {} pps", attacker, victim, rate_pps));
    scenario.category = FailureCategory::Cyber;
    scenario.severity = Severity::High;
    let params = EventParams { flood_source: Some(attacker), flood_rate_pps: rate_pps, ..EventParams::default() };
    scenario.add_event(
        FailureEvent::new(EventKind::TrafficFlood, EventTarget::Node { node: victim }, at, duration)
            .named("flood")
            .with_params(params)
            .with_category(FailureCategory::Cyber, Severity::High),
    );
    scenario
}
