//! Error types for model mutation and script generation.
//!
//! Every variant carries the ids (and, where relevant, the offending field)
//! needed to surface it verbatim to a user.

use std::fmt;
use std::net::Ipv4Addr;

use thiserror::Error;

use crate::failure::{EventId, EventKind, EventState};
use crate::topology::{Endpoint, LinkId, LinkKind, NodeId};
use crate::traffic::FlowId;

/// Result type alias for model and generator operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Kind of entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Node,
    Link,
    Port,
    Flow,
    Event,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Node => "node",
            Entity::Link => "link",
            Entity::Port => "port",
            Entity::Flow => "flow",
            Entity::Event => "event",
        };
        f.write_str(name)
    }
}

/// Why a port cannot take a new link endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortIssue {
    Missing,
    Connected(LinkId),
}

impl fmt::Display for PortIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortIssue::Missing => f.write_str("no such port"),
            PortIssue::Connected(link) => write!(f, "already connected to link {}", link),
        }
    }
}

/// Core error taxonomy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },

    #[error("port {port} on node {node} is unavailable: {reason}")]
    PortUnavailable { node: NodeId, port: u32, reason: PortIssue },

    #[error("link would join port {port} on node {node} to itself")]
    SelfLoop { node: NodeId, port: u32 },

    #[error("node {node} still has dependent links: {}", join(.links))]
    HasDependentLinks { node: NodeId, links: Vec<LinkId> },

    #[error("invalid topology: {}", join(.violations))]
    InvalidTopology { violations: Vec<Violation> },

    #[error("link {link} has kind {kind} with no channel mapping or fallback")]
    UnsupportedLinkKind { link: LinkId, kind: LinkKind },

    #[error("flow {flow} uses application {kind}, which cannot be emitted: {reason}")]
    UnsupportedApplication { flow: FlowId, kind: String, reason: String },

    #[error("broadcast domain {domain} needs {needed} addresses but a /{prefix_len} subnet holds {available}")]
    AddressSpaceExhausted {
        domain: usize,
        needed: usize,
        available: usize,
        prefix_len: u8,
    },

    #[error("event {event} cannot move from {from} to {to}")]
    InvalidTransition { event: EventId, from: EventState, to: EventState },
}

impl ModelError {
    pub(crate) fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        ModelError::NotFound { entity, id: id.to_string() }
    }
}

/// One structural problem found while validating a snapshot for generation.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    FlowEndpointMissing { flow: FlowId, field: &'static str, node: NodeId },
    FlowSelfTarget { flow: FlowId, node: NodeId },
    FlowTargetUnaddressed { flow: FlowId, node: NodeId },
    FlowWindow { flow: FlowId, start: f64, stop: f64 },
    LinkEndpointMissing { link: LinkId, node: NodeId, port: u32 },
    PortUnaddressed { node: NodeId, port: u32 },
    DuplicateAddress { ip: Ipv4Addr, first: Endpoint, second: Endpoint },
    DuplicateId { entity: Entity, id: String },
    RouteInterfaceMissing { node: NodeId, port: u32 },
    EventTargetMissing { event: EventId, entity: Entity, id: String },
    EventReferenceMissing { event: EventId, field: &'static str, missing: EventId },
    EventParameterMissing { event: EventId, field: &'static str },
    EventTargetMismatch { event: EventId, kind: EventKind, target: &'static str },
    EventTiming { event: EventId, trigger: f64 },
    CascadeCycle { event: EventId, cause: EventId },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::FlowEndpointMissing { flow, field, node } => {
                write!(f, "flow {} field '{}' references missing node {}", flow, field, node)
            }
            Violation::FlowSelfTarget { flow, node } => {
                write!(f, "flow {} has node {} as both source and target", flow, node)
            }
            Violation::FlowTargetUnaddressed { flow, node } => {
                write!(f, "flow {} targets node {} which has no assigned address", flow, node)
            }
            Violation::FlowWindow { flow, start, stop } => {
                write!(f, "flow {} stops at {} which is not after its start {}", flow, stop, start)
            }
            Violation::LinkEndpointMissing { link, node, port } => {
                write!(f, "link {} references missing or detached port {} on node {}", link, port, node)
            }
            Violation::PortUnaddressed { node, port } => {
                write!(f, "connected port {} on node {} has no assigned address", port, node)
            }
            Violation::DuplicateAddress { ip, first, second } => {
                write!(f, "address {} is bound to both {} and {}", ip, first, second)
            }
            Violation::DuplicateId { entity, id } => write!(f, "{} id {} is declared more than once", entity, id),
            Violation::RouteInterfaceMissing { node, port } => {
                write!(f, "manual route on node {} leaves through port {} which is not connected", node, port)
            }
            Violation::EventTargetMissing { event, entity, id } => {
                write!(f, "event {} targets missing {} {}", event, entity, id)
            }
            Violation::EventReferenceMissing { event, field, missing } => {
                write!(f, "event {} field '{}' references missing event {}", event, field, missing)
            }
            Violation::EventParameterMissing { event, field } => {
                write!(f, "event {} is missing required parameter '{}'", event, field)
            }
            Violation::EventTargetMismatch { event, kind, target } => {
                write!(f, "event {} of kind {} cannot target a {}", event, kind, target)
            }
            Violation::EventTiming { event, trigger } => {
                write!(f, "event {} has invalid trigger time {}", event, trigger)
            }
            Violation::CascadeCycle { event, cause } => {
                write!(f, "linking {} as caused by {} would form a cascade cycle", event, cause)
            }
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(|item| item.to_string()).collect::<Vec<_>>().join(", ")
}
