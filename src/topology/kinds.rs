//! Node and link kind tables.
//!
//! Each kind maps to exactly one profile entry. Adding a kind means adding
//! one arm to the matching `profile` function; call sites only ever consult
//! the profile.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::grid::{GridAttributes, GridProtocol, ScanClass};
use crate::utils::duration::Delay;
use crate::utils::rate::DataRate;

/// How a node takes part in layer-3 forwarding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Originates and terminates traffic; holds addresses
    EndHost,
    /// Forwards between broadcast domains; one address per attached domain
    Router,
    /// Joins its links into one broadcast domain; holds no addresses
    Bridge,
}

/// Kind of simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Host,
    Router,
    Switch,
    AccessPoint,
    Station,
    ControlCenter,
    BackupControlCenter,
    Rtu,
    Ied,
    Relay,
    Meter,
    DataConcentrator,
    Gateway,
    CommRouter,
    CommSwitch,
    Historian,
    Hmi,
}

/// Static description of a node kind
#[derive(Debug, Clone, Copy)]
pub struct NodeProfile {
    pub name: &'static str,
    pub role: NodeRole,
    pub default_ports: u32,
    pub grid: bool,
}

impl NodeKind {
    pub fn profile(self) -> NodeProfile {
        use NodeRole::*;
        let (name, role, default_ports, grid) = match self {
            NodeKind::Host => ("HOST", EndHost, 1, false),
            NodeKind::Router => ("ROUTER", Router, 4, false),
            NodeKind::Switch => ("SWITCH", Bridge, 8, false),
            NodeKind::AccessPoint => ("ACCESS_POINT", Bridge, 2, false),
            NodeKind::Station => ("STATION", EndHost, 1, false),
            NodeKind::ControlCenter => ("CONTROL_CENTER", EndHost, 2, true),
            NodeKind::BackupControlCenter => ("BACKUP_CONTROL_CENTER", EndHost, 2, true),
            NodeKind::Rtu => ("RTU", EndHost, 1, true),
            NodeKind::Ied => ("IED", EndHost, 1, true),
            NodeKind::Relay => ("RELAY", EndHost, 1, true),
            NodeKind::Meter => ("METER", EndHost, 1, true),
            NodeKind::DataConcentrator => ("DATA_CONCENTRATOR", EndHost, 2, true),
            NodeKind::Gateway => ("GATEWAY", Router, 4, true),
            NodeKind::CommRouter => ("COMM_ROUTER", Router, 4, true),
            NodeKind::CommSwitch => ("COMM_SWITCH", Bridge, 8, true),
            NodeKind::Historian => ("HISTORIAN", EndHost, 2, true),
            NodeKind::Hmi => ("HMI", EndHost, 1, true),
        };
        NodeProfile { name, role, default_ports, grid }
    }

    pub fn as_str(self) -> &'static str {
        self.profile().name
    }

    pub fn role(self) -> NodeRole {
        self.profile().role
    }

    pub fn is_bridge(self) -> bool {
        self.role() == NodeRole::Bridge
    }

    pub fn is_grid(self) -> bool {
        self.profile().grid
    }

    /// Grid attributes a freshly created node of this kind starts with
    pub fn default_grid_attributes(self) -> Option<GridAttributes> {
        if !self.is_grid() {
            return None;
        }
        let mut attrs = GridAttributes::default();
        match self {
            NodeKind::ControlCenter => {
                attrs.scan_class = Some(ScanClass::Integrity);
                attrs.failover_priority = 1;
            }
            NodeKind::BackupControlCenter => {
                attrs.scan_class = Some(ScanClass::Integrity);
                attrs.failover_priority = 2;
                attrs.is_backup = true;
            }
            NodeKind::Ied | NodeKind::Relay => {
                attrs.protocol = GridProtocol::Iec61850Goose;
                attrs.scan_class = Some(ScanClass::Exception);
            }
            NodeKind::Meter => {
                attrs.protocol = GridProtocol::Modbus;
                attrs.scan_class = Some(ScanClass::Class3);
            }
            NodeKind::DataConcentrator => attrs.scan_class = Some(ScanClass::Class2),
            NodeKind::Historian => attrs.protocol = GridProtocol::Iccp,
            _ => {}
        }
        Some(attrs)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of physical or logical medium a link models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkKind {
    PointToPoint,
    Csma,
    Fiber,
    CopperSerial,
    EthernetLan,
    Microwave,
    LicensedRadio,
    SpreadSpectrum,
    CellularLte,
    #[serde(rename = "CELLULAR_5G")]
    Cellular5g,
    PrivateLte,
    SatelliteGeo,
    SatelliteLeo,
    WifiMesh,
    Wimax,
    Zigbee,
    Emulated,
}

/// How propagation delay scales with distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Propagation {
    /// Signal in a cable or fibre
    Guided,
    /// Free-space radio path
    LineOfSight,
    /// Delay does not follow from distance (cellular core, satellite hop)
    Fixed,
}

impl Propagation {
    /// Signal speed in metres per second, if delay follows from distance
    pub fn speed_m_per_s(self) -> Option<f64> {
        match self {
            Propagation::Guided => Some(2.0e8),
            Propagation::LineOfSight => Some(3.0e8),
            Propagation::Fixed => None,
        }
    }
}

/// Physical defaults for a link kind
#[derive(Debug, Clone, Copy)]
pub struct LinkProfile {
    pub name: &'static str,
    pub data_rate: DataRate,
    pub delay: Delay,
    pub bit_error_rate: f64,
    pub propagation: Propagation,
}

impl LinkKind {
    pub fn profile(self) -> LinkProfile {
        use Propagation::*;
        let (name, data_rate, delay, bit_error_rate, propagation) = match self {
            LinkKind::PointToPoint => ("POINT_TO_POINT", DataRate::from_mbps(100), Delay::from_millis(2), 0.0, Fixed),
            LinkKind::Csma => ("CSMA", DataRate::from_mbps(100), Delay::from_millis(2), 0.0, Fixed),
            LinkKind::Fiber => ("FIBER", DataRate::from_gbps(1), Delay::from_micros(100), 1e-12, Guided),
            LinkKind::CopperSerial => ("COPPER_SERIAL", DataRate::from_bps(19_200), Delay::from_millis(10), 1e-6, Guided),
            LinkKind::EthernetLan => ("ETHERNET_LAN", DataRate::from_gbps(1), Delay::from_micros(10), 1e-10, Guided),
            LinkKind::Microwave => ("MICROWAVE", DataRate::from_mbps(100), Delay::from_millis(1), 1e-8, LineOfSight),
            LinkKind::LicensedRadio => ("LICENSED_RADIO", DataRate::from_bps(9_600), Delay::from_millis(50), 1e-5, LineOfSight),
            LinkKind::SpreadSpectrum => ("SPREAD_SPECTRUM", DataRate::from_bps(115_200), Delay::from_millis(20), 1e-6, LineOfSight),
            LinkKind::CellularLte => ("CELLULAR_LTE", DataRate::from_mbps(50), Delay::from_millis(30), 0.0, Fixed),
            LinkKind::Cellular5g => ("CELLULAR_5G", DataRate::from_mbps(100), Delay::from_millis(10), 0.0, Fixed),
            LinkKind::PrivateLte => ("PRIVATE_LTE", DataRate::from_mbps(50), Delay::from_millis(20), 0.0, Fixed),
            LinkKind::SatelliteGeo => ("SATELLITE_GEO", DataRate::from_mbps(5), Delay::from_millis(270), 0.0, Fixed),
            LinkKind::SatelliteLeo => ("SATELLITE_LEO", DataRate::from_mbps(50), Delay::from_millis(20), 0.0, Fixed),
            LinkKind::WifiMesh => ("WIFI_MESH", DataRate::from_mbps(54), Delay::from_millis(5), 0.0, Fixed),
            LinkKind::Wimax => ("WIMAX", DataRate::from_mbps(10), Delay::from_millis(30), 0.0, Fixed),
            LinkKind::Zigbee => ("ZIGBEE", DataRate::from_kbps(250), Delay::from_millis(10), 0.0, Fixed),
            LinkKind::Emulated => ("EMULATED", DataRate::from_mbps(100), Delay::ZERO, 0.0, Fixed),
        };
        LinkProfile { name, data_rate, delay, bit_error_rate, propagation }
    }

    pub fn as_str(self) -> &'static str {
        self.profile().name
    }

    /// Delay over `distance_km` for media whose delay follows from distance
    pub fn distance_delay(self, distance_km: f64) -> Option<Delay> {
        let speed = self.profile().propagation.speed_m_per_s()?;
        Some(Delay::from_secs_f64(distance_km * 1_000.0 / speed))
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
