//! Routing table type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::utils::ip_utils::netmask;

/// How a node's routing table is populated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Derived from shortest paths over the live graph
    #[default]
    Automatic,
    /// Stored entries are authoritative
    Manual,
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingMode::Automatic => f.write_str("automatic"),
            RoutingMode::Manual => f.write_str("manual"),
        }
    }
}

/// Origin of a route entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Connected,
    Static,
    Default,
}

/// One routing table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub destination: Ipv4Addr,
    pub prefix_len: u8,
    /// 0.0.0.0 for directly reachable destinations
    #[serde(default = "unspecified")]
    pub gateway: Ipv4Addr,
    /// Egress port index on the owning node
    pub interface: u32,
    #[serde(default)]
    pub metric: u32,
    pub kind: RouteKind,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

fn unspecified() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn enabled() -> bool {
    true
}

impl RouteEntry {
    /// Route to a directly attached network
    pub fn connected(destination: Ipv4Addr, prefix_len: u8, interface: u32) -> Self {
        Self {
            destination,
            prefix_len,
            gateway: Ipv4Addr::UNSPECIFIED,
            interface,
            metric: 0,
            kind: RouteKind::Connected,
            enabled: true,
        }
    }

    /// Route to a remote network through `gateway`
    pub fn via(destination: Ipv4Addr, prefix_len: u8, gateway: Ipv4Addr, interface: u32, metric: u32) -> Self {
        Self {
            destination,
            prefix_len,
            gateway,
            interface,
            metric,
            kind: RouteKind::Static,
            enabled: true,
        }
    }

    /// 0.0.0.0/0 through `gateway`
    pub fn default_route(gateway: Ipv4Addr, interface: u32) -> Self {
        Self {
            destination: Ipv4Addr::UNSPECIFIED,
            prefix_len: 0,
            gateway,
            interface,
            metric: 0,
            kind: RouteKind::Default,
            enabled: true,
        }
    }

    pub fn netmask(&self) -> Ipv4Addr {
        netmask(self.prefix_len)
    }

    pub fn is_default(&self) -> bool {
        self.kind == RouteKind::Default || (self.destination.is_unspecified() && self.prefix_len == 0)
    }

    /// No next hop needed
    pub fn is_direct(&self) -> bool {
        self.kind == RouteKind::Connected || self.gateway.is_unspecified()
    }
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.destination, self.prefix_len)?;
        if !self.is_direct() {
            write!(f, " via {}", self.gateway)?;
        }
        write!(f, " if {} metric {}", self.interface, self.metric)
    }
}

/// Per-node routing table
///
/// Manual entries are the persisted truth. Derived entries are rebuilt by
/// route computation and are never written out.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutingTable {
    #[serde(default)]
    pub mode: RoutingMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    manual: Vec<RouteEntry>,
    #[serde(skip)]
    derived: Vec<RouteEntry>,
}

impl RoutingTable {
    pub fn manual() -> Self {
        Self { mode: RoutingMode::Manual, ..Self::default() }
    }

    /// Entries in effect for the current mode
    pub fn entries(&self) -> &[RouteEntry] {
        match self.mode {
            RoutingMode::Automatic => &self.derived,
            RoutingMode::Manual => &self.manual,
        }
    }

    pub fn manual_entries(&self) -> &[RouteEntry] {
        &self.manual
    }

    pub fn derived_entries(&self) -> &[RouteEntry] {
        &self.derived
    }

    pub fn add_manual(&mut self, entry: RouteEntry) {
        self.manual.push(entry);
    }

    /// Remove a manual entry by position
    pub fn remove_manual(&mut self, index: usize) -> Option<RouteEntry> {
        (index < self.manual.len()).then(|| self.manual.remove(index))
    }

    pub(crate) fn set_derived(&mut self, entries: Vec<RouteEntry>) {
        self.derived = entries;
    }

    pub(crate) fn clear_derived(&mut self) {
        self.derived.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_entry_helpers() {
        let direct = RouteEntry::connected(Ipv4Addr::new(10, 1, 0, 0), 24, 0);
        assert!(direct.is_direct());
        assert!(!direct.is_default());
        assert_eq!(direct.netmask(), Ipv4Addr::new(255, 255, 255, 0));

        let default = RouteEntry::default_route(Ipv4Addr::new(10, 1, 0, 1), 0);
        assert!(default.is_default());
        assert!(!default.is_direct());
        assert_eq!(default.netmask(), Ipv4Addr::UNSPECIFIED);

        let via = RouteEntry::via(Ipv4Addr::new(10, 1, 2, 0), 24, Ipv4Addr::new(10, 1, 0, 2), 1, 2);
        assert_eq!(via.to_string(), "10.1.2.0/24 via 10.1.0.2 if 1 metric 2");
    }

    #[test]
    fn test_derived_entries_are_not_persisted() {
        let mut table = RoutingTable::default();
        table.set_derived(vec![RouteEntry::connected(Ipv4Addr::new(10, 1, 0, 0), 24, 0)]);
        let yaml = serde_yaml::to_string(&table).unwrap();
        let restored: RoutingTable = serde_yaml::from_str(&yaml).unwrap();
        assert!(restored.entries().is_empty());
        assert_eq!(restored.mode, RoutingMode::Automatic);
    }

    #[test]
    fn test_manual_entries_survive_mode_toggle() {
        let mut table = RoutingTable::manual();
        table.add_manual(RouteEntry::default_route(Ipv4Addr::new(10, 1, 0, 1), 0));
        table.mode = RoutingMode::Automatic;
        assert!(table.entries().is_empty());
        table.mode = RoutingMode::Manual;
        assert_eq!(table.entries().len(), 1);

        let yaml = serde_yaml::to_string(&table).unwrap();
        let restored: RoutingTable = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(restored, table);
    }
}
