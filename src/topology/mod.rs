//! Network topology module.
//!
//! This module contains the topology graph: node and link kinds with their
//! default profiles, grid domain attributes, and the invariant-preserving
//! mutation operations on the model.

pub mod grid;
pub mod kinds;
pub mod model;
pub mod types;

// Re-export key types for easier access
pub use grid::{GridAttributes, GridProtocol, ScanClass, VoltageLevel};
pub use kinds::{LinkKind, LinkProfile, NodeKind, NodeProfile, NodeRole, Propagation};
pub use model::TopologyModel;
pub use types::{
    Endpoint, InterfaceAddress, Link, LinkId, LinkParams, LinkSpec, Node, NodeAttrs, NodeId, Port, Position,
    Redundancy,
};
