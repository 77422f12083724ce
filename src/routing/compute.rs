//! Shortest-path route derivation for automatic-mode nodes.
//!
//! Nodes are adjacent when they share a live broadcast domain. Only the
//! source and routers forward, so paths never transit an end host. BFS
//! explores neighbours in ascending node id, which settles equal-length
//! paths on the lowest ids.

use log::{debug, info};
use std::collections::{BTreeMap, VecDeque};
use std::net::Ipv4Addr;

use super::types::{RouteEntry, RoutingMode};
use crate::ip::broadcast_domains;
use crate::topology::{Endpoint, NodeId, NodeRole, TopologyModel};
use crate::utils::ip_utils::network_of;

/// One addressed, live broadcast domain
#[derive(Debug)]
struct Segment {
    subnet: Ipv4Addr,
    prefix_len: u8,
    attached: Vec<(Endpoint, Ipv4Addr)>,
}

impl Segment {
    fn port_of(&self, node: NodeId) -> Option<(Endpoint, Ipv4Addr)> {
        self.attached.iter().find(|(ep, _)| ep.node == node).copied()
    }
}

/// How to reach an adjacent node
#[derive(Debug, Clone, Copy)]
struct Hop {
    egress_port: u32,
    gateway: Ipv4Addr,
}

/// What a route computation produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteSummary {
    pub automatic_nodes: usize,
    pub manual_nodes: usize,
    pub entries: usize,
}

impl TopologyModel {
    /// Rebuild derived routes for every automatic-mode node.
    ///
    /// Manual-mode tables are left exactly as they are.
    pub fn compute_routes(&mut self) -> RouteSummary {
        let mut derived = derive_routes(self);
        let mut summary = RouteSummary::default();

        for node in self.nodes.values_mut() {
            match node.routing.mode {
                RoutingMode::Manual => summary.manual_nodes += 1,
                RoutingMode::Automatic => {
                    let entries = derived.remove(&node.id).unwrap_or_default();
                    summary.automatic_nodes += 1;
                    summary.entries += entries.len();
                    node.routing.set_derived(entries);
                }
            }
        }
        self.touch();

        info!(
            "Computed {} routes for {} automatic nodes ({} manual nodes untouched)",
            summary.entries, summary.automatic_nodes, summary.manual_nodes
        );
        summary
    }
}

/// Derived route entries for each automatic, non-bridge node
pub fn derive_routes(model: &TopologyModel) -> BTreeMap<NodeId, Vec<RouteEntry>> {
    let segments = live_segments(model);

    let mut adjacency: BTreeMap<NodeId, BTreeMap<NodeId, Hop>> = BTreeMap::new();
    for segment in &segments {
        for (from, _) in &segment.attached {
            for (to, to_ip) in &segment.attached {
                if from.node == to.node {
                    continue;
                }
                adjacency
                    .entry(from.node)
                    .or_default()
                    .entry(to.node)
                    .or_insert(Hop { egress_port: from.port, gateway: *to_ip });
            }
        }
    }

    let mut tables = BTreeMap::new();
    for node in model.nodes() {
        if node.routing.mode != RoutingMode::Automatic || node.kind().is_bridge() {
            continue;
        }
        let reach = shortest_paths(model, &adjacency, node.id());
        let mut entries: Vec<RouteEntry> = Vec::new();

        for segment in &segments {
            if let Some((endpoint, _)) = segment.port_of(node.id()) {
                entries.push(RouteEntry::connected(segment.subnet, segment.prefix_len, endpoint.port));
            }
        }

        for segment in &segments {
            let known = entries
                .iter()
                .any(|e| e.destination == segment.subnet && e.prefix_len == segment.prefix_len);
            if known {
                continue;
            }
            // nearest attached router; ties go to the lowest id
            let nearest = segment
                .attached
                .iter()
                .filter(|(ep, _)| is_router(model, ep.node))
                .filter_map(|(ep, _)| reach.get(&ep.node).map(|r| (r.distance, ep.node, r.hop)))
                .min_by_key(|(distance, id, _)| (*distance, *id));
            if let Some((distance, via, hop)) = nearest {
                debug!("{} reaches {}/{} via {} ({} hops)", node.id(), segment.subnet, segment.prefix_len, via, distance);
                entries.push(RouteEntry::via(
                    segment.subnet,
                    segment.prefix_len,
                    hop.gateway,
                    hop.egress_port,
                    distance,
                ));
            }
        }

        tables.insert(node.id(), entries);
    }
    tables
}

#[derive(Debug, Clone, Copy)]
struct Reach {
    distance: u32,
    hop: Hop,
}

/// BFS from `source`, recording hop count and first hop for each reached node
fn shortest_paths(
    model: &TopologyModel,
    adjacency: &BTreeMap<NodeId, BTreeMap<NodeId, Hop>>,
    source: NodeId,
) -> BTreeMap<NodeId, Reach> {
    let mut reached: BTreeMap<NodeId, Reach> = BTreeMap::new();
    let mut queue = VecDeque::from([source]);

    while let Some(current) = queue.pop_front() {
        if current != source && !is_router(model, current) {
            continue;
        }
        let Some(neighbours) = adjacency.get(&current) else {
            continue;
        };
        let base = reached.get(&current).copied();
        for (next, hop) in neighbours {
            if *next == source || reached.contains_key(next) {
                continue;
            }
            let reach = match base {
                None => Reach { distance: 1, hop: *hop },
                Some(parent) => Reach { distance: parent.distance + 1, hop: parent.hop },
            };
            reached.insert(*next, reach);
            queue.push_back(*next);
        }
    }
    reached
}

fn is_router(model: &TopologyModel, node: NodeId) -> bool {
    model.node(node).map(|n| n.kind().role() == NodeRole::Router).unwrap_or(false)
}

fn live_segments(model: &TopologyModel) -> Vec<Segment> {
    broadcast_domains(model, true)
        .into_iter()
        .filter_map(|domain| {
            let attached: Vec<(Endpoint, Ipv4Addr, u8)> = domain
                .members
                .iter()
                .filter_map(|ep| {
                    let address = model.port(*ep)?.address?;
                    Some((*ep, address.ip, address.prefix_len))
                })
                .collect();
            let (_, first_ip, prefix_len) = *attached.first()?;
            Some(Segment {
                subnet: network_of(first_ip, prefix_len),
                prefix_len,
                attached: attached.into_iter().map(|(ep, ip, _)| (ep, ip)).collect(),
            })
        })
        .collect()
}
