//! The mutable topology graph.
//!
//! Every mutation either fully applies or leaves the model untouched, and
//! every successful mutation bumps the generation counter so callers can
//! tell a snapshot is stale.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::kinds::{LinkKind, NodeKind};
use super::types::{Endpoint, Link, LinkId, LinkSpec, Node, NodeAttrs, NodeId, Port};
use crate::error::{Entity, ModelError, PortIssue, Result, Violation};
use crate::routing::RoutingTable;

/// In-memory graph of nodes, ports and links
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "TopologyRecord", into = "TopologyRecord")]
pub struct TopologyModel {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) links: BTreeMap<LinkId, Link>,
    last_node_id: u32,
    last_link_id: u32,
    generation: u64,
}

impl TopologyModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic mutation counter
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn touch(&mut self) {
        self.generation += 1;
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or_else(|| ModelError::not_found(Entity::Node, id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or_else(|| ModelError::not_found(Entity::Node, id))
    }

    pub fn link(&self, id: LinkId) -> Result<&Link> {
        self.links.get(&id).ok_or_else(|| ModelError::not_found(Entity::Link, id))
    }

    /// Nodes in id (declaration) order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Links in id (declaration) order
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn port(&self, endpoint: Endpoint) -> Option<&Port> {
        self.nodes.get(&endpoint.node)?.port(endpoint.port)
    }

    /// Links terminating on any port of `node`, ascending
    pub fn links_of(&self, node: NodeId) -> Vec<LinkId> {
        let ids: BTreeSet<LinkId> = self
            .nodes
            .get(&node)
            .map(|n| n.ports.iter().filter_map(|p| p.link).collect())
            .unwrap_or_default();
        ids.into_iter().collect()
    }

    /// Add a node of `kind`. Always succeeds with a fresh id.
    pub fn add_node(&mut self, kind: NodeKind, attrs: NodeAttrs) -> NodeId {
        self.last_node_id += 1;
        let id = NodeId(self.last_node_id);
        let port_count = attrs.port_count.unwrap_or(kind.profile().default_ports);
        let name = attrs
            .name
            .unwrap_or_else(|| format!("{}_{}", kind.as_str().to_lowercase(), id.0));
        let grid = if kind.is_grid() {
            attrs.grid.or_else(|| kind.default_grid_attributes())
        } else {
            None
        };

        let node = Node {
            id,
            name,
            kind,
            position: attrs.position,
            ports: (0..port_count).map(Port::new).collect(),
            grid,
            routing: RoutingTable::default(),
        };
        debug!("Added node {} '{}' ({}) with {} ports", id, node.name, kind, port_count);
        self.nodes.insert(id, node);
        self.touch();
        id
    }

    /// Append one port to `node`, returning its index
    pub fn add_port(&mut self, node: NodeId) -> Result<u32> {
        let target = self.node_mut(node)?;
        let index = target.ports.iter().map(|p| p.index + 1).max().unwrap_or(0);
        target.ports.push(Port::new(index));
        self.touch();
        Ok(index)
    }

    /// Remove a node.
    ///
    /// Without `cascade`, a node with connected ports is refused with
    /// `HasDependentLinks`. With it, every touching link is removed first
    /// and returned.
    pub fn remove_node(&mut self, id: NodeId, cascade: bool) -> Result<Vec<Link>> {
        self.node(id)?;
        let dependent = self.links_of(id);
        if !dependent.is_empty() && !cascade {
            return Err(ModelError::HasDependentLinks { node: id, links: dependent });
        }

        let removed: Vec<Link> = dependent.into_iter().filter_map(|l| self.detach_link(l)).collect();
        self.nodes.remove(&id);
        self.touch();
        debug!("Removed node {} and {} dependent link(s)", id, removed.len());
        Ok(removed)
    }

    /// Change a node's kind, keeping its id and ports.
    ///
    /// Grid attributes are filled in from the new kind when missing and
    /// dropped when the new kind is not a grid kind. Derived routes are
    /// cleared since the node's forwarding role may have changed.
    pub fn retype_node(&mut self, id: NodeId, kind: NodeKind) -> Result<()> {
        let node = self.node_mut(id)?;
        let previous = node.kind;
        node.kind = kind;
        if kind.is_grid() {
            if node.grid.is_none() {
                node.grid = kind.default_grid_attributes();
            }
        } else {
            node.grid = None;
        }
        node.routing.clear_derived();
        self.touch();
        debug!("Retyped node {} from {} to {}", id, previous, kind);
        Ok(())
    }

    /// Connect two free ports with a new link
    pub fn add_link(
        &mut self,
        a_node: NodeId,
        a_port: u32,
        b_node: NodeId,
        b_port: u32,
        kind: LinkKind,
        spec: LinkSpec,
    ) -> Result<LinkId> {
        let a = Endpoint::new(a_node, a_port);
        let b = Endpoint::new(b_node, b_port);
        self.check_free(a)?;
        self.check_free(b)?;
        if a == b {
            return Err(ModelError::SelfLoop { node: a_node, port: a_port });
        }
        if let Some(primary) = spec.redundancy.backs_up {
            self.link(primary)?;
        }

        self.last_link_id += 1;
        let id = LinkId(self.last_link_id);
        let link = Link {
            id,
            name: spec.name.clone().unwrap_or_default(),
            a,
            b,
            kind,
            params: spec.resolve(kind),
            distance_km: spec.distance_km,
            redundancy: spec.redundancy,
        };

        for endpoint in [a, b] {
            if let Some(port) = self.nodes.get_mut(&endpoint.node).and_then(|n| n.port_mut(endpoint.port)) {
                port.link = Some(id);
            }
        }
        debug!("Added {} link {} between {} and {}", kind, id, a, b);
        self.links.insert(id, link);
        self.touch();
        Ok(id)
    }

    /// Remove a link, releasing both of its ports
    pub fn remove_link(&mut self, id: LinkId) -> Result<Link> {
        self.link(id)?;
        let link = self
            .detach_link(id)
            .ok_or_else(|| ModelError::not_found(Entity::Link, id))?;
        self.touch();
        debug!("Removed link {}", id);
        Ok(link)
    }

    /// Enable or disable a port
    pub fn set_port_enabled(&mut self, endpoint: Endpoint, enabled: bool) -> Result<()> {
        let node = self.node_mut(endpoint.node)?;
        let port = node
            .port_mut(endpoint.port)
            .ok_or_else(|| ModelError::not_found(Entity::Port, endpoint))?;
        port.enabled = enabled;
        self.touch();
        Ok(())
    }

    /// Mutable access to a node's routing table; counts as a mutation
    pub fn routing_table_mut(&mut self, node: NodeId) -> Result<&mut RoutingTable> {
        self.node(node)?;
        self.touch();
        Ok(&mut self.node_mut(node)?.routing)
    }

    fn check_free(&self, endpoint: Endpoint) -> Result<()> {
        let node = self.node(endpoint.node)?;
        match node.port(endpoint.port) {
            None => Err(ModelError::PortUnavailable {
                node: endpoint.node,
                port: endpoint.port,
                reason: PortIssue::Missing,
            }),
            Some(port) => match port.link {
                Some(existing) => Err(ModelError::PortUnavailable {
                    node: endpoint.node,
                    port: endpoint.port,
                    reason: PortIssue::Connected(existing),
                }),
                None => Ok(()),
            },
        }
    }

    /// Drop a link and free its ports and any backup references to it
    fn detach_link(&mut self, id: LinkId) -> Option<Link> {
        let link = self.links.remove(&id)?;
        for endpoint in link.endpoints() {
            if let Some(port) = self.nodes.get_mut(&endpoint.node).and_then(|n| n.port_mut(endpoint.port)) {
                port.link = None;
                port.address = None;
            }
        }
        for other in self.links.values_mut() {
            if other.redundancy.backs_up == Some(id) {
                other.redundancy.backs_up = None;
            }
        }
        Some(link)
    }
}

/// Persisted shape of the topology.
///
/// The id counters are saved so ids of removed entities stay retired
/// across a save and load.
#[derive(Serialize, Deserialize)]
struct TopologyRecord {
    #[serde(default)]
    last_node_id: u32,
    #[serde(default)]
    last_link_id: u32,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    links: Vec<Link>,
}

impl From<TopologyModel> for TopologyRecord {
    fn from(model: TopologyModel) -> Self {
        Self {
            last_node_id: model.last_node_id,
            last_link_id: model.last_link_id,
            nodes: model.nodes.into_values().collect(),
            links: model.links.into_values().collect(),
        }
    }
}

impl TryFrom<TopologyRecord> for TopologyModel {
    type Error = ModelError;

    /// Rebuild the model, refusing any dangling cross reference
    fn try_from(record: TopologyRecord) -> Result<Self> {
        let mut model = TopologyModel {
            last_node_id: record.last_node_id,
            last_link_id: record.last_link_id,
            ..TopologyModel::default()
        };
        let mut duplicates = Vec::new();

        for node in record.nodes {
            model.last_node_id = model.last_node_id.max(node.id.0);
            if model.nodes.contains_key(&node.id) {
                duplicates.push(Violation::DuplicateId { entity: Entity::Node, id: node.id.to_string() });
                continue;
            }
            model.nodes.insert(node.id, node);
        }
        for link in record.links {
            model.last_link_id = model.last_link_id.max(link.id.0);
            if model.links.contains_key(&link.id) {
                duplicates.push(Violation::DuplicateId { entity: Entity::Link, id: link.id.to_string() });
                continue;
            }
            model.links.insert(link.id, link);
        }
        if !duplicates.is_empty() {
            return Err(ModelError::InvalidTopology { violations: duplicates });
        }

        for link in model.links.values() {
            for endpoint in link.endpoints() {
                let port = model.port(endpoint).ok_or(ModelError::PortUnavailable {
                    node: endpoint.node,
                    port: endpoint.port,
                    reason: PortIssue::Missing,
                })?;
                if port.link != Some(link.id) {
                    return Err(ModelError::PortUnavailable {
                        node: endpoint.node,
                        port: endpoint.port,
                        reason: match port.link {
                            Some(other) => PortIssue::Connected(other),
                            None => PortIssue::Missing,
                        },
                    });
                }
            }
            if let Some(primary) = link.redundancy.backs_up {
                model.link(primary)?;
            }
        }

        for node in model.nodes.values() {
            for port in &node.ports {
                if let Some(link) = port.link {
                    let owner = model.link(link)?;
                    if !owner.endpoints().contains(&Endpoint::new(node.id, port.index)) {
                        return Err(ModelError::not_found(Entity::Link, link));
                    }
                }
            }
        }

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_hosts() -> (TopologyModel, NodeId, NodeId) {
        let mut model = TopologyModel::new();
        let a = model.add_node(NodeKind::Host, NodeAttrs::named("a"));
        let b = model.add_node(NodeKind::Host, NodeAttrs::named("b"));
        (model, a, b)
    }

    #[test]
    fn test_add_node_defaults() {
        let mut model = TopologyModel::new();
        let r = model.add_node(NodeKind::Router, NodeAttrs::default());
        let rtu = model.add_node(NodeKind::Rtu, NodeAttrs::default());

        let router = model.node(r).unwrap();
        assert_eq!(router.name, "router_1");
        assert_eq!(router.ports().len(), 4);
        assert!(router.grid.is_none());
        assert!(model.node(rtu).unwrap().grid.is_some());
        assert_ne!(r, rtu);
        assert_eq!(model.generation(), 2);
    }

    #[test]
    fn test_add_link_marks_ports() {
        let (mut model, a, b) = two_hosts();
        let link = model.add_link(a, 0, b, 0, LinkKind::Fiber, LinkSpec::default()).unwrap();
        assert_eq!(model.node(a).unwrap().port(0).unwrap().link(), Some(link));
        assert_eq!(model.node(b).unwrap().port(0).unwrap().link(), Some(link));
    }

    #[test]
    fn test_add_link_conflicts() {
        let (mut model, a, b) = two_hosts();
        let c = model.add_node(NodeKind::Switch, NodeAttrs::default());
        let first = model.add_link(a, 0, b, 0, LinkKind::Fiber, LinkSpec::default()).unwrap();
        let generation = model.generation();

        let err = model.add_link(a, 0, c, 0, LinkKind::Fiber, LinkSpec::default()).unwrap_err();
        assert_eq!(
            err,
            ModelError::PortUnavailable { node: a, port: 0, reason: PortIssue::Connected(first) }
        );

        let err = model.add_link(c, 9, a, 0, LinkKind::Fiber, LinkSpec::default()).unwrap_err();
        assert_eq!(err, ModelError::PortUnavailable { node: c, port: 9, reason: PortIssue::Missing });

        let err = model.add_link(c, 1, c, 1, LinkKind::Csma, LinkSpec::default()).unwrap_err();
        assert_eq!(err, ModelError::SelfLoop { node: c, port: 1 });

        assert_eq!(model.generation(), generation);
        assert_eq!(model.link_count(), 1);
    }

    #[test]
    fn test_remove_node_without_cascade_is_refused() {
        let mut model = TopologyModel::new();
        let sw = model.add_node(NodeKind::Switch, NodeAttrs::default());
        let h1 = model.add_node(NodeKind::Host, NodeAttrs::default());
        let h2 = model.add_node(NodeKind::Host, NodeAttrs::default());
        let l1 = model.add_link(h1, 0, sw, 0, LinkKind::EthernetLan, LinkSpec::default()).unwrap();
        let l2 = model.add_link(h2, 0, sw, 1, LinkKind::EthernetLan, LinkSpec::default()).unwrap();

        let err = model.remove_node(sw, false).unwrap_err();
        assert_eq!(err, ModelError::HasDependentLinks { node: sw, links: vec![l1, l2] });
        assert_eq!(model.node_count(), 3);
        assert_eq!(model.link_count(), 2);

        let removed = model.remove_node(sw, true).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(model.node_count(), 2);
        assert_eq!(model.link_count(), 0);
        assert!(!model.node(h1).unwrap().port(0).unwrap().is_connected());
    }

    #[test]
    fn test_remove_missing() {
        let mut model = TopologyModel::new();
        assert!(matches!(model.remove_node(NodeId(7), true), Err(ModelError::NotFound { .. })));
        assert!(matches!(model.remove_link(LinkId(7)), Err(ModelError::NotFound { .. })));
    }

    #[test]
    fn test_removing_primary_clears_backup_reference() {
        let mut model = TopologyModel::new();
        let a = model.add_node(NodeKind::Router, NodeAttrs::default());
        let b = model.add_node(NodeKind::Router, NodeAttrs::default());
        let primary = model.add_link(a, 0, b, 0, LinkKind::Fiber, LinkSpec::default()).unwrap();
        let spec = LinkSpec {
            redundancy: crate::topology::Redundancy { is_backup: true, backs_up: Some(primary) },
            ..LinkSpec::default()
        };
        let backup = model.add_link(a, 1, b, 1, LinkKind::SatelliteGeo, spec).unwrap();

        model.remove_link(primary).unwrap();
        let backup = model.link(backup).unwrap();
        assert!(backup.redundancy.is_backup);
        assert_eq!(backup.redundancy.backs_up, None);
    }

    #[test]
    fn test_retype_preserves_id_and_ports() {
        let mut model = TopologyModel::new();
        let id = model.add_node(NodeKind::Host, NodeAttrs::default().with_ports(3));
        model.retype_node(id, NodeKind::Rtu).unwrap();
        let node = model.node(id).unwrap();
        assert_eq!(node.kind(), NodeKind::Rtu);
        assert_eq!(node.ports().len(), 3);
        assert!(node.grid.is_some());

        model.retype_node(id, NodeKind::Router).unwrap();
        assert!(model.node(id).unwrap().grid.is_none());
    }

    #[test]
    fn test_record_round_trip_keeps_ids() {
        let (mut model, a, b) = two_hosts();
        model.add_link(a, 0, b, 0, LinkKind::Microwave, LinkSpec::default()).unwrap();
        model.remove_node(a, true).unwrap();

        let yaml = serde_yaml::to_string(&model).unwrap();
        let mut restored: TopologyModel = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(restored.node_count(), 1);
        assert_eq!(restored.node(b).unwrap().name, "b");

        // fresh ids continue past the persisted ones
        let c = restored.add_node(NodeKind::Host, NodeAttrs::default());
        assert_eq!(c, NodeId(3));
    }

    #[test]
    fn test_record_with_dangling_port_reference_is_rejected() {
        let yaml = r#"
nodes:
  - id: 1
    name: a
    kind: HOST
    ports:
      - index: 0
        link: 5
links: []
"#;
        let err = serde_yaml::from_str::<TopologyModel>(yaml).unwrap_err();
        assert!(err.to_string().contains("link l5 not found"));
    }

    #[test]
    fn test_removed_ids_stay_retired_after_reload() {
        let mut model = TopologyModel::new();
        let a = model.add_node(NodeKind::Router, NodeAttrs::named("a"));
        let b = model.add_node(NodeKind::Router, NodeAttrs::named("b"));
        let c = model.add_node(NodeKind::Host, NodeAttrs::named("c"));
        model.add_link(a, 0, b, 0, LinkKind::Fiber, LinkSpec::default()).unwrap();
        let last_link = model.add_link(b, 1, c, 0, LinkKind::Fiber, LinkSpec::default()).unwrap();
        model.remove_link(last_link).unwrap();
        model.remove_node(c, false).unwrap();

        let yaml = serde_yaml::to_string(&model).unwrap();
        let mut restored: TopologyModel = serde_yaml::from_str(&yaml).unwrap();

        let node = restored.add_node(NodeKind::Host, NodeAttrs::default());
        assert_ne!(node, c);
        assert_eq!(node, NodeId(4));
        let link = restored.add_link(a, 1, node, 0, LinkKind::Fiber, LinkSpec::default()).unwrap();
        assert_ne!(link, last_link);
        assert_eq!(link, LinkId(3));
    }

    #[test]
    fn test_stale_counter_in_record_is_lifted() {
        let yaml = r#"
last_node_id: 1
nodes:
  - {id: 5, name: a, kind: HOST}
"#;
        let mut model: TopologyModel = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(model.add_node(NodeKind::Host, NodeAttrs::default()), NodeId(6));
    }

    #[test]
    fn test_record_with_duplicate_ids_is_rejected() {
        let yaml = r#"
nodes:
  - {id: 1, name: first, kind: HOST}
  - {id: 1, name: second, kind: ROUTER}
links: []
"#;
        let err = serde_yaml::from_str::<TopologyModel>(yaml).unwrap_err();
        assert!(err.to_string().contains("node id n1 is declared more than once"), "{}", err);
    }
}
