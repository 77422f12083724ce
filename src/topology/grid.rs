//! Electric-grid domain attributes carried by grid node kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Nominal voltage class of the equipment's substation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoltageLevel {
    #[serde(rename = "500kV")]
    Kv500,
    #[serde(rename = "345kV")]
    Kv345,
    #[serde(rename = "230kV")]
    Kv230,
    #[serde(rename = "138kV")]
    Kv138,
    #[serde(rename = "69kV")]
    Kv69,
    #[serde(rename = "34.5kV")]
    Kv34_5,
    #[serde(rename = "13.8kV")]
    Kv13_8,
    #[serde(rename = "4.16kV")]
    Kv4_16,
    #[serde(rename = "480V")]
    V480,
    #[serde(rename = "240V")]
    V240,
}

impl fmt::Display for VoltageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VoltageLevel::Kv500 => "500kV",
            VoltageLevel::Kv345 => "345kV",
            VoltageLevel::Kv230 => "230kV",
            VoltageLevel::Kv138 => "138kV",
            VoltageLevel::Kv69 => "69kV",
            VoltageLevel::Kv34_5 => "34.5kV",
            VoltageLevel::Kv13_8 => "13.8kV",
            VoltageLevel::Kv4_16 => "4.16kV",
            VoltageLevel::V480 => "480V",
            VoltageLevel::V240 => "240V",
        };
        f.write_str(label)
    }
}

/// SCADA scan class, i.e. how often a master polls the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanClass {
    /// Event driven, no periodic poll
    Exception,
    Class1,
    Class2,
    Class3,
    Integrity,
}

impl ScanClass {
    /// Poll period in milliseconds; 0 for event-driven
    pub fn interval_ms(self) -> u32 {
        match self {
            ScanClass::Exception => 0,
            ScanClass::Class1 => 1_000,
            ScanClass::Class2 => 4_000,
            ScanClass::Class3 => 30_000,
            ScanClass::Integrity => 60_000,
        }
    }
}

/// Application protocol spoken by a grid device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GridProtocol {
    #[default]
    #[serde(rename = "DNP3")]
    Dnp3,
    #[serde(rename = "IEC61850_GOOSE")]
    Iec61850Goose,
    #[serde(rename = "IEC61850_MMS")]
    Iec61850Mms,
    #[serde(rename = "MODBUS")]
    Modbus,
    #[serde(rename = "ICCP")]
    Iccp,
}

impl fmt::Display for GridProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GridProtocol::Dnp3 => "DNP3",
            GridProtocol::Iec61850Goose => "IEC61850_GOOSE",
            GridProtocol::Iec61850Mms => "IEC61850_MMS",
            GridProtocol::Modbus => "MODBUS",
            GridProtocol::Iccp => "ICCP",
        };
        f.write_str(label)
    }
}

/// Domain attributes of a grid node
///
/// These never affect identity. They steer generation: node annotations,
/// poll intervals for flows targeting the node, and failover ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_level: Option<VoltageLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_class: Option<ScanClass>,
    #[serde(default)]
    pub protocol: GridProtocol,
    /// Lower is preferred when choosing a failover target
    #[serde(default = "default_failover_priority")]
    pub failover_priority: u8,
    #[serde(default)]
    pub is_backup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dnp3_address: Option<u16>,
}

fn default_failover_priority() -> u8 {
    5
}

impl Default for GridAttributes {
    fn default() -> Self {
        Self {
            substation_id: None,
            voltage_level: None,
            scan_class: None,
            protocol: GridProtocol::default(),
            failover_priority: default_failover_priority(),
            is_backup: false,
            dnp3_address: None,
        }
    }
}
