//! Everything decided before the first line of text is written.
//!
//! Building an [`EmitContext`] runs every check that can fail. Once it
//! exists, emitting the sections cannot fail.

use log::{debug, warn};
use std::collections::BTreeMap;

use super::channels::{plan_channels, ChannelPlan};
use super::GeneratorOptions;
use crate::error::{ModelError, Result};
use crate::failure::{schedule, FailureSchedule};
use crate::project::ModelSnapshot;
use crate::routing::RoutingMode;
use crate::topology::{Endpoint, LinkId, Node, NodeId, TopologyModel};
use crate::traffic::{ResolvedFlow, TrafficFlow};
use crate::utils::validation::validate_snapshot;

/// Where a model port ended up in the emitted program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub link_index: usize,
    /// Position of the device inside `devices<link_index>`
    pub side: usize,
    /// IPv4 interface index; bridge ports have none
    pub if_index: Option<u32>,
}

impl Attachment {
    pub fn device(&self) -> String {
        format!("devices{}.Get({})", self.link_index, self.side)
    }
}

/// A flow with its realized application and clamped window
#[derive(Debug, Clone)]
pub struct FlowPlan<'a> {
    pub flow: &'a TrafficFlow,
    pub resolved: ResolvedFlow,
    pub start: f64,
    pub stop: f64,
}

impl FlowPlan<'_> {
    /// Whether any part of the window falls inside the simulation
    pub fn runs(&self) -> bool {
        self.stop > self.start
    }
}

pub struct EmitContext<'a> {
    pub snapshot: &'a ModelSnapshot,
    pub options: &'a GeneratorOptions,
    pub channels: Vec<ChannelPlan<'a>>,
    pub flows: Vec<FlowPlan<'a>>,
    /// Present only when failures are included and something is scheduled
    pub schedule: Option<FailureSchedule>,
    node_index: BTreeMap<NodeId, usize>,
    attachments: BTreeMap<Endpoint, Attachment>,
}

impl<'a> EmitContext<'a> {
    pub fn build(snapshot: &'a ModelSnapshot, options: &'a GeneratorOptions) -> Result<Self> {
        let model = snapshot.topology();
        let violations = validate_snapshot(snapshot, options.include_failures);
        if !violations.is_empty() {
            return Err(ModelError::InvalidTopology { violations });
        }

        let channels = plan_channels(model)?;
        let node_index: BTreeMap<NodeId, usize> = model.nodes().enumerate().map(|(i, n)| (n.id(), i)).collect();
        let attachments = attach_ports(model, &channels);

        let duration = snapshot.general().duration;
        let mut flows = Vec::with_capacity(snapshot.flows().len());
        for flow in snapshot.flows() {
            let resolved = flow.resolve(model.node(flow.target).ok())?;
            let stop = flow.stop.min(duration);
            if flow.start >= duration {
                warn!("{} starts at {}s, after the simulation ends; it will not be installed", flow.id, flow.start);
            } else if stop < flow.stop {
                warn!(
                    "{} runs until {}s but the simulation stops at {}s; clamping",
                    flow.id, flow.stop, duration
                );
            }
            flows.push(FlowPlan { flow, resolved, start: flow.start, stop });
        }

        let schedule = match (options.include_failures, snapshot.scenario()) {
            (true, Some(scenario)) => {
                let schedule = schedule(scenario, model)?;
                debug!("Scenario '{}' yields {} effect(s)", scenario.name, schedule.effect_count());
                (!schedule.is_empty()).then_some(schedule)
            }
            _ => None,
        };

        Ok(Self { snapshot, options, channels, flows, schedule, node_index, attachments })
    }

    pub fn model(&self) -> &'a TopologyModel {
        self.snapshot.topology()
    }

    /// Position of the node inside the `nodes` container
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.node_index.get(&id).copied()
    }

    pub fn channel(&self, link: LinkId) -> Option<&ChannelPlan<'a>> {
        self.channels.iter().find(|c| c.link.id() == link)
    }

    pub fn attachment(&self, endpoint: Endpoint) -> Option<Attachment> {
        self.attachments.get(&endpoint).copied()
    }

    /// Nodes that carry an IP stack, in container order
    pub fn ip_nodes(&self) -> impl Iterator<Item = (usize, &'a Node)> + '_ {
        self.model().nodes().enumerate().filter(|(_, n)| !n.kind().is_bridge())
    }

    pub fn has_automatic(&self) -> bool {
        self.ip_nodes().any(|(_, n)| n.routing.mode == RoutingMode::Automatic)
    }

    pub fn has_manual(&self) -> bool {
        self.ip_nodes().any(|(_, n)| n.routing.mode == RoutingMode::Manual)
    }
}

/// Interface indices follow link order, a side before b side. Index 0 is
/// the loopback.
fn attach_ports(model: &TopologyModel, channels: &[ChannelPlan<'_>]) -> BTreeMap<Endpoint, Attachment> {
    let mut next_if: BTreeMap<NodeId, u32> = BTreeMap::new();
    let mut attachments = BTreeMap::new();
    for plan in channels {
        for (side, endpoint) in plan.link.endpoints().into_iter().enumerate() {
            let bridge = model.node(endpoint.node).map(|n| n.kind().is_bridge()).unwrap_or(true);
            let if_index = (!bridge).then(|| {
                let next = next_if.entry(endpoint.node).or_insert(1);
                let index = *next;
                *next += 1;
                index
            });
            attachments.insert(endpoint, Attachment { link_index: plan.index, side, if_index });
        }
    }
    attachments
}
