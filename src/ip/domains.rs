//! Broadcast-domain computation.
//!
//! Links meeting at a bridge node share a domain; bridges chained through
//! other bridges merge into one. Routers and end hosts bound domains.

use std::collections::{BTreeMap, BTreeSet};

use crate::topology::{Endpoint, Link, LinkId, NodeId, TopologyModel};

/// A maximal set of links joined at bridge nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastDomain {
    /// Position in the ordering by lowest member link id
    pub index: usize,
    /// Member links, ascending
    pub links: Vec<LinkId>,
    /// Address-bearing ports in the domain, ordered by (node, port)
    pub members: Vec<Endpoint>,
}

impl BroadcastDomain {
    pub fn contains_node(&self, node: NodeId) -> bool {
        self.members.iter().any(|m| m.node == node)
    }

    /// This node's lowest-index port in the domain
    pub fn port_of(&self, node: NodeId) -> Option<Endpoint> {
        self.members.iter().find(|m| m.node == node).copied()
    }
}

/// Compute the broadcast domains of `model`.
///
/// With `live_only`, links with a disabled endpoint port are left out,
/// which can split a domain while a failure is in effect.
pub fn broadcast_domains(model: &TopologyModel, live_only: bool) -> Vec<BroadcastDomain> {
    let links: Vec<&Link> = model
        .links()
        .filter(|link| !live_only || is_live(model, link))
        .collect();

    let mut sets = DisjointSet::new(links.len());
    let mut first_at_bridge: BTreeMap<NodeId, usize> = BTreeMap::new();
    for (i, link) in links.iter().enumerate() {
        for endpoint in link.endpoints() {
            if !is_bridge(model, endpoint.node) {
                continue;
            }
            match first_at_bridge.get(&endpoint.node) {
                Some(&j) => sets.union(i, j),
                None => {
                    first_at_bridge.insert(endpoint.node, i);
                }
            }
        }
    }

    // Domains are numbered in order of their first (lowest id) link
    let mut slot_of_root: BTreeMap<usize, usize> = BTreeMap::new();
    let mut grouped: Vec<(Vec<LinkId>, BTreeSet<Endpoint>)> = Vec::new();
    for (i, link) in links.iter().enumerate() {
        let root = sets.find(i);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            grouped.push((Vec::new(), BTreeSet::new()));
            grouped.len() - 1
        });
        let (domain_links, members) = &mut grouped[slot];
        domain_links.push(link.id());
        for endpoint in link.endpoints() {
            if !is_bridge(model, endpoint.node) {
                members.insert(endpoint);
            }
        }
    }

    grouped
        .into_iter()
        .enumerate()
        .map(|(index, (links, members))| BroadcastDomain {
            index,
            links,
            members: members.into_iter().collect(),
        })
        .collect()
}

fn is_bridge(model: &TopologyModel, node: NodeId) -> bool {
    model.node(node).map(|n| n.kind().is_bridge()).unwrap_or(false)
}

fn is_live(model: &TopologyModel, link: &Link) -> bool {
    link.endpoints()
        .iter()
        .all(|ep| model.port(*ep).map(|p| p.enabled).unwrap_or(false))
}

/// Union-find over link positions
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self { parent: (0..size).collect() }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cursor = i;
        while self.parent[cursor] != root {
            let next = self.parent[cursor];
            self.parent[cursor] = root;
            cursor = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[high] = low;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{LinkKind, LinkSpec, NodeAttrs, NodeKind};

    #[test]
    fn test_switches_in_series_merge() {
        let mut model = TopologyModel::new();
        let h1 = model.add_node(NodeKind::Host, NodeAttrs::default());
        let s1 = model.add_node(NodeKind::Switch, NodeAttrs::default());
        let s2 = model.add_node(NodeKind::Switch, NodeAttrs::default());
        let h2 = model.add_node(NodeKind::Host, NodeAttrs::default());
        model.add_link(h1, 0, s1, 0, LinkKind::EthernetLan, LinkSpec::default()).unwrap();
        model.add_link(s1, 1, s2, 0, LinkKind::EthernetLan, LinkSpec::default()).unwrap();
        model.add_link(s2, 1, h2, 0, LinkKind::EthernetLan, LinkSpec::default()).unwrap();

        let domains = broadcast_domains(&model, false);
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].links.len(), 3);
        assert_eq!(domains[0].members, vec![Endpoint::new(h1, 0), Endpoint::new(h2, 0)]);
    }

    #[test]
    fn test_router_splits_domains() {
        let mut model = TopologyModel::new();
        let h1 = model.add_node(NodeKind::Host, NodeAttrs::default());
        let sw = model.add_node(NodeKind::Switch, NodeAttrs::default());
        let r = model.add_node(NodeKind::Router, NodeAttrs::default());
        let h2 = model.add_node(NodeKind::Host, NodeAttrs::default());
        model.add_link(h1, 0, sw, 0, LinkKind::EthernetLan, LinkSpec::default()).unwrap();
        model.add_link(r, 0, sw, 1, LinkKind::EthernetLan, LinkSpec::default()).unwrap();
        model.add_link(r, 1, h2, 0, LinkKind::Fiber, LinkSpec::default()).unwrap();

        let domains = broadcast_domains(&model, false);
        assert_eq!(domains.len(), 2);
        assert_eq!(domains[0].members, vec![Endpoint::new(h1, 0), Endpoint::new(r, 0)]);
        assert_eq!(domains[1].members, vec![Endpoint::new(r, 1), Endpoint::new(h2, 0)]);
        assert_eq!(domains[1].port_of(r), Some(Endpoint::new(r, 1)));
    }

    #[test]
    fn test_live_only_drops_disabled_links() {
        let mut model = TopologyModel::new();
        let h1 = model.add_node(NodeKind::Host, NodeAttrs::default());
        let sw = model.add_node(NodeKind::Switch, NodeAttrs::default());
        let h2 = model.add_node(NodeKind::Host, NodeAttrs::default());
        model.add_link(h1, 0, sw, 0, LinkKind::EthernetLan, LinkSpec::default()).unwrap();
        model.add_link(h2, 0, sw, 1, LinkKind::EthernetLan, LinkSpec::default()).unwrap();
        model.set_port_enabled(Endpoint::new(sw, 1), false).unwrap();

        assert_eq!(broadcast_domains(&model, false)[0].members.len(), 2);
        let live = broadcast_domains(&model, true);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].members, vec![Endpoint::new(h1, 0)]);
    }
}
