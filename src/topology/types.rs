//! Topology type definitions.
//!
//! Identifiers, nodes with their ports, and links between ports.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use super::grid::GridAttributes;
use super::kinds::{LinkKind, NodeKind};
use crate::routing::RoutingTable;
use crate::utils::duration::Delay;
use crate::utils::rate::DataRate;

/// Stable node identifier, never reused within a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Stable link identifier, never reused within a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub u32);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

/// One side of a link: a node and one of its port indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: NodeId,
    pub port: u32,
}

impl Endpoint {
    pub fn new(node: NodeId, port: u32) -> Self {
        Self { node, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port)
    }
}

/// Canvas position; layout only
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Address bound to a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceAddress {
    pub ip: Ipv4Addr,
    pub prefix_len: u8,
}

/// Attachment point on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<InterfaceAddress>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) link: Option<LinkId>,
}

fn default_enabled() -> bool {
    true
}

impl Port {
    pub fn new(index: u32) -> Self {
        Self { index, address: None, enabled: true, link: None }
    }

    /// Link currently terminating on this port
    pub fn link(&self) -> Option<LinkId> {
        self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }
}

/// A simulated device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub(crate) id: NodeId,
    pub name: String,
    pub(crate) kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub(crate) ports: Vec<Port>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridAttributes>,
    #[serde(default)]
    pub routing: RoutingTable,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, index: u32) -> Option<&Port> {
        self.ports.iter().find(|p| p.index == index)
    }

    pub(crate) fn port_mut(&mut self, index: u32) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.index == index)
    }

    /// First addressed port, by port index
    pub fn primary_address(&self) -> Option<InterfaceAddress> {
        self.ports.iter().find_map(|p| p.address)
    }

    pub fn connected_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.is_connected())
    }
}

/// Creation attributes for [`TopologyModel::add_node`](super::TopologyModel::add_node)
#[derive(Debug, Clone, Default)]
pub struct NodeAttrs {
    pub name: Option<String>,
    pub position: Position,
    /// Overrides the kind's default port count
    pub port_count: Option<u32>,
    /// Overrides the kind's default grid attributes (ignored for non-grid kinds)
    pub grid: Option<GridAttributes>,
}

impl NodeAttrs {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn with_ports(mut self, count: u32) -> Self {
        self.port_count = Some(count);
        self
    }

    pub fn with_grid(mut self, grid: GridAttributes) -> Self {
        self.grid = Some(grid);
        self
    }
}

/// Physical parameters of a channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkParams {
    pub data_rate: DataRate,
    pub delay: Delay,
    #[serde(default)]
    pub bit_error_rate: f64,
}

/// Backup-path metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Redundancy {
    #[serde(default)]
    pub is_backup: bool,
    /// Primary link this one backs up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backs_up: Option<LinkId>,
}

/// Undirected edge between two ports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub(crate) id: LinkId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub(crate) a: Endpoint,
    pub(crate) b: Endpoint,
    pub(crate) kind: LinkKind,
    pub params: LinkParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub redundancy: Redundancy,
}

impl Link {
    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn a(&self) -> Endpoint {
        self.a
    }

    pub fn b(&self) -> Endpoint {
        self.b
    }

    pub fn endpoints(&self) -> [Endpoint; 2] {
        [self.a, self.b]
    }

    pub fn kind(&self) -> LinkKind {
        self.kind
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.a.node == node || self.b.node == node
    }

    /// The endpoint opposite `node`, if the link touches it
    pub fn peer_of(&self, node: NodeId) -> Option<Endpoint> {
        if self.a.node == node {
            Some(self.b)
        } else if self.b.node == node {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Optional overrides for [`TopologyModel::add_link`](super::TopologyModel::add_link)
///
/// Anything left unset comes from the link kind's profile; an unset delay
/// on a distance-aware medium is derived from `distance_km`.
#[derive(Debug, Clone, Default)]
pub struct LinkSpec {
    pub name: Option<String>,
    pub data_rate: Option<DataRate>,
    pub delay: Option<Delay>,
    pub bit_error_rate: Option<f64>,
    pub distance_km: Option<f64>,
    pub redundancy: Redundancy,
}

impl LinkSpec {
    pub fn resolve(&self, kind: LinkKind) -> LinkParams {
        let profile = kind.profile();
        let derived_delay = self.distance_km.and_then(|km| kind.distance_delay(km));
        LinkParams {
            data_rate: self.data_rate.unwrap_or(profile.data_rate),
            delay: self.delay.or(derived_delay).unwrap_or(profile.delay),
            bit_error_rate: self.bit_error_rate.unwrap_or(profile.bit_error_rate),
        }
    }
}
