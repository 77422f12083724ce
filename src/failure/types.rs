//! Failure event types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::topology::{LinkId, NodeId};
use crate::utils::duration::Delay;
use crate::utils::rate::DataRate;

/// Stable event identifier, unique within a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u32);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// What a failure event does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    LinkDown,
    LinkUp,
    LinkDegraded,
    LinkFlapping,
    NodePowerLoss,
    NodePowerRestore,
    NodeReboot,
    InterfaceDown,
    NetworkPartition,
    TrafficFlood,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::LinkDown => "LINK_DOWN",
            EventKind::LinkUp => "LINK_UP",
            EventKind::LinkDegraded => "LINK_DEGRADED",
            EventKind::LinkFlapping => "LINK_FLAPPING",
            EventKind::NodePowerLoss => "NODE_POWER_LOSS",
            EventKind::NodePowerRestore => "NODE_POWER_RESTORE",
            EventKind::NodeReboot => "NODE_REBOOT",
            EventKind::InterfaceDown => "INTERFACE_DOWN",
            EventKind::NetworkPartition => "NETWORK_PARTITION",
            EventKind::TrafficFlood => "TRAFFIC_FLOOD",
        }
    }

    /// Whether `target` is a meaningful target for this kind
    pub fn accepts(self, target: &EventTarget) -> bool {
        match self {
            EventKind::LinkDown | EventKind::LinkUp | EventKind::LinkFlapping => {
                matches!(target, EventTarget::Link { .. } | EventTarget::Interface { .. })
            }
            EventKind::LinkDegraded => matches!(target, EventTarget::Link { .. }),
            EventKind::NodePowerLoss
            | EventKind::NodePowerRestore
            | EventKind::NodeReboot
            | EventKind::TrafficFlood => matches!(target, EventTarget::Node { .. }),
            EventKind::InterfaceDown => matches!(target, EventTarget::Interface { .. }),
            EventKind::NetworkPartition => matches!(target, EventTarget::Groups { .. }),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an event acts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventTarget {
    Link { link: LinkId },
    Node { node: NodeId },
    Interface { node: NodeId, port: u32 },
    /// Two node groups to separate
    Groups { a: Vec<NodeId>, b: Vec<NodeId> },
}

impl EventTarget {
    pub fn label(&self) -> &'static str {
        match self {
            EventTarget::Link { .. } => "link",
            EventTarget::Node { .. } => "node",
            EventTarget::Interface { .. } => "interface",
            EventTarget::Groups { .. } => "groups",
        }
    }
}

impl fmt::Display for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTarget::Link { link } => write!(f, "{}", link),
            EventTarget::Node { node } => write!(f, "{}", node),
            EventTarget::Interface { node, port } => write!(f, "{}:{}", node, port),
            EventTarget::Groups { a, b } => {
                let list = |ids: &[NodeId]| ids.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(",");
                write!(f, "[{}] | [{}]", list(a), list(b))
            }
        }
    }
}

/// Lifecycle of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventState {
    #[default]
    Scheduled,
    Active,
    Recovered,
    Cancelled,
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventState::Scheduled => "scheduled",
            EventState::Active => "active",
            EventState::Recovered => "recovered",
            EventState::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    #[default]
    Equipment,
    Natural,
    Cyber,
    Human,
    Maintenance,
    Cascading,
}

/// Impact level, 1 (critical) to 5 (informational)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical = 1,
    High = 2,
    #[default]
    Medium = 3,
    Low = 4,
    Info = 5,
}

impl Severity {
    pub fn level(self) -> u8 {
        self as u8
    }
}

/// Type-specific event parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_data_rate: Option<DataRate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_delay: Option<Delay>,
    /// Bit error rate while degraded, applied as a per-bit receive error model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    #[serde(default = "default_up_duration")]
    pub up_duration: f64,
    #[serde(default = "default_down_duration")]
    pub down_duration: f64,
    #[serde(default = "default_flap_cycles")]
    pub flap_cycles: u32,
    #[serde(default = "default_reboot_duration")]
    pub reboot_duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flood_source: Option<NodeId>,
    #[serde(default = "default_flood_rate_pps")]
    pub flood_rate_pps: u32,
    #[serde(default = "default_flood_packet_size")]
    pub flood_packet_size: u32,
    /// Absolute recovery time for an open-ended degradation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_time: Option<f64>,
}

fn default_up_duration() -> f64 {
    5.0
}

fn default_down_duration() -> f64 {
    2.0
}

fn default_flap_cycles() -> u32 {
    3
}

fn default_reboot_duration() -> f64 {
    30.0
}

fn default_flood_rate_pps() -> u32 {
    10_000
}

fn default_flood_packet_size() -> u32 {
    64
}

impl Default for EventParams {
    fn default() -> Self {
        Self {
            new_data_rate: None,
            new_delay: None,
            error_rate: None,
            up_duration: default_up_duration(),
            down_duration: default_down_duration(),
            flap_cycles: default_flap_cycles(),
            reboot_duration: default_reboot_duration(),
            flood_source: None,
            flood_rate_pps: default_flood_rate_pps(),
            flood_packet_size: default_flood_packet_size(),
            recovery_time: None,
        }
    }
}

/// Duration value meaning "until explicit recovery"
pub const PERMANENT: f64 = -1.0;

fn default_duration() -> f64 {
    PERMANENT
}

/// A timed, typed perturbation of the topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub(crate) id: EventId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub kind: EventKind,
    pub target: EventTarget,
    pub(crate) trigger_time: f64,
    /// Negative means permanent
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default)]
    pub params: EventParams,
    #[serde(default)]
    pub(crate) state: EventState,
    #[serde(default)]
    pub category: FailureCategory,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) caused_by: Option<EventId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) causes: Vec<EventId>,
}

impl FailureEvent {
    /// An unscheduled event; the scenario assigns its id on insertion
    pub fn new(kind: EventKind, target: EventTarget, trigger_time: f64, duration: f64) -> Self {
        Self {
            id: EventId(0),
            name: String::new(),
            description: String::new(),
            kind,
            target,
            trigger_time,
            duration,
            params: EventParams::default(),
            state: EventState::Scheduled,
            category: FailureCategory::default(),
            severity: Severity::default(),
            caused_by: None,
            causes: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_params(mut self, params: EventParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_category(mut self, category: FailureCategory, severity: Severity) -> Self {
        self.category = category;
        self.severity = severity;
        self
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn trigger_time(&self) -> f64 {
        self.trigger_time
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn caused_by(&self) -> Option<EventId> {
        self.caused_by
    }

    pub fn causes(&self) -> &[EventId] {
        &self.causes
    }

    pub fn is_permanent(&self) -> bool {
        self.duration < 0.0
    }

    /// End of the active window, `None` when open-ended
    pub fn end_time(&self) -> Option<f64> {
        (!self.is_permanent()).then(|| self.trigger_time + self.duration)
    }

    /// Name for comments: the configured name or the id
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.id.to_string()
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_yaml_defaults() {
        let yaml = r#"
id: 4
kind: LINK_DOWN
target: { type: link, link: 2 }
trigger_time: 10.0
"#;
        let event: FailureEvent = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(event.id(), EventId(4));
        assert!(event.is_permanent());
        assert_eq!(event.end_time(), None);
        assert_eq!(event.state(), EventState::Scheduled);
        assert_eq!(event.params.flap_cycles, 3);
        assert_eq!(event.target, EventTarget::Link { link: LinkId(2) });
    }

    #[test]
    fn test_kind_target_compatibility() {
        let link = EventTarget::Link { link: LinkId(1) };
        let node = EventTarget::Node { node: NodeId(1) };
        assert!(EventKind::LinkDown.accepts(&link));
        assert!(!EventKind::LinkDown.accepts(&node));
        assert!(EventKind::NodeReboot.accepts(&node));
        assert!(!EventKind::NetworkPartition.accepts(&node));
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(Severity::Critical.level(), 1);
        assert_eq!(Severity::Info.level(), 5);
    }
}
