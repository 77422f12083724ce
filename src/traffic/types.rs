//! Traffic flow definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::classes::GridTrafficSpec;
use crate::topology::NodeId;
use crate::utils::rate::DataRate;

/// Port used by generic flows when none is given
pub const DEFAULT_PORT: u16 = 9;
/// Port used by grid-class flows when none is given
pub const GRID_PORT: u16 = 20_000;

/// Stable flow identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub u32);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// Transport used by a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Datagram
    #[default]
    Udp,
    /// Connection-oriented
    Tcp,
}

impl Protocol {
    /// Socket factory type id in the simulation engine
    pub fn socket_factory(self) -> &'static str {
        match self {
            Protocol::Udp => "ns3::UdpSocketFactory",
            Protocol::Tcp => "ns3::TcpSocketFactory",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => f.write_str("udp"),
            Protocol::Tcp => f.write_str("tcp"),
        }
    }
}

/// Generic application realizing a flow
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApplicationKind {
    /// Request/response echo
    #[default]
    Echo,
    /// Constant or on/off bitrate
    OnOff,
    /// Saturating bulk transfer
    BulkSend,
    Ping,
    /// User-supplied handler, imported and instantiated as-is
    Custom { symbol: String, source_file: PathBuf },
}

impl ApplicationKind {
    pub fn label(&self) -> &'static str {
        match self {
            ApplicationKind::Echo => "echo",
            ApplicationKind::OnOff => "on_off",
            ApplicationKind::BulkSend => "bulk_send",
            ApplicationKind::Ping => "ping",
            ApplicationKind::Custom { .. } => "custom",
        }
    }
}

/// Kind-specific application parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppParams {
    #[serde(default = "default_packet_size")]
    pub packet_size: u32,
    #[serde(default = "default_data_rate")]
    pub data_rate: DataRate,
    /// Seconds between echo requests
    #[serde(default = "default_interval")]
    pub interval: f64,
    #[serde(default = "default_max_packets")]
    pub max_packets: u32,
    /// 0 means unlimited
    #[serde(default)]
    pub max_bytes: u64,
    #[serde(default = "default_on_time")]
    pub on_time: f64,
    #[serde(default)]
    pub off_time: f64,
}

fn default_packet_size() -> u32 {
    1024
}

fn default_data_rate() -> DataRate {
    DataRate::from_kbps(500)
}

fn default_interval() -> f64 {
    1.0
}

fn default_max_packets() -> u32 {
    10
}

fn default_on_time() -> f64 {
    1.0
}

impl Default for AppParams {
    fn default() -> Self {
        Self {
            packet_size: default_packet_size(),
            data_rate: default_data_rate(),
            interval: default_interval(),
            max_packets: default_max_packets(),
            max_bytes: 0,
            on_time: default_on_time(),
            off_time: 0.0,
        }
    }
}

/// A configured stream of packets between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficFlow {
    pub id: FlowId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub application: ApplicationKind,
    #[serde(default = "default_start")]
    pub start: f64,
    #[serde(default = "default_stop")]
    pub stop: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub params: AppParams,
    /// Grid traffic class; when present it decides how the flow is realized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridTrafficSpec>,
}

fn default_start() -> f64 {
    1.0
}

fn default_stop() -> f64 {
    9.0
}

impl TrafficFlow {
    /// A generic flow with default timing and parameters
    pub fn new(id: FlowId, source: NodeId, target: NodeId, application: ApplicationKind) -> Self {
        Self {
            id,
            name: String::new(),
            source,
            target,
            protocol: Protocol::default(),
            application,
            start: default_start(),
            stop: default_stop(),
            port: None,
            params: AppParams::default(),
            grid: None,
        }
    }

    /// A grid flow whose class decides the application
    pub fn grid(id: FlowId, source: NodeId, target: NodeId, spec: GridTrafficSpec) -> Self {
        Self { grid: Some(spec), ..Self::new(id, source, target, ApplicationKind::default()) }
    }

    pub fn with_window(mut self, start: f64, stop: f64) -> Self {
        self.start = start;
        self.stop = stop;
        self
    }

    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.grid.is_some() { GRID_PORT } else { DEFAULT_PORT })
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
    fn test_flow_defaults_from_yaml() {
        let yaml = r#"
id: 1
source: 1
target: 2
"#;
        let flow: TrafficFlow = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(flow.start, 1.0);
        assert_eq!(flow.stop, 9.0);
        assert_eq!(flow.application, ApplicationKind::Echo);
        assert_eq!(flow.params.packet_size, 1024);
        assert_eq!(flow.params.data_rate, DataRate::from_kbps(500));
        assert_eq!(flow.effective_port(), DEFAULT_PORT);
    }

    #[test]
    fn test_custom_handler_yaml() {
        let yaml = r#"
id: 3
source: 1
target: 2
application:
  type: custom
  symbol: ModbusPoller
  source_file: handlers/modbus.py
"#;
        let flow: TrafficFlow = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            flow.application,
            ApplicationKind::Custom {
                symbol: "ModbusPoller".to_string(),
                source_file: PathBuf::from("handlers/modbus.py"),
            }
        );
        let text = serde_yaml::to_string(&flow).unwrap();
        let again: TrafficFlow = serde_yaml::from_str(&text).unwrap();
        assert_eq!(again, flow);
    }
}
