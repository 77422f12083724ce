//! Grid traffic classes, QoS priorities and DNP3 message sizing.
//!
//! Each class maps to one row of a strategy table. Adding a class means
//! adding a row in [`TrafficClass::profile`], nothing else.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of SCADA or protection traffic a grid flow carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrafficClass {
    IntegrityPoll,
    ExceptionPoll,
    ProtectionMessage,
    Telemetry,
    Heartbeat,
    EventReport,
    ControlCommand,
    FileTransfer,
    TimeSync,
}

/// QoS priority, marked in the IP header as a DSCP value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrafficPriority {
    Protection,
    Control,
    ScadaHigh,
    ScadaNormal,
    Monitoring,
    BestEffort,
}

impl TrafficPriority {
    pub fn dscp(self) -> u8 {
        match self {
            TrafficPriority::Protection => 46,
            TrafficPriority::Control => 34,
            TrafficPriority::ScadaHigh => 26,
            TrafficPriority::ScadaNormal => 18,
            TrafficPriority::Monitoring => 10,
            TrafficPriority::BestEffort => 0,
        }
    }

    /// ToS byte carrying the DSCP in its upper six bits
    pub fn tos(self) -> u8 {
        self.dscp() << 2
    }

    /// Per-hop behaviour name of the DSCP
    pub fn phb(self) -> &'static str {
        match self {
            TrafficPriority::Protection => "EF",
            TrafficPriority::Control => "AF41",
            TrafficPriority::ScadaHigh => "AF31",
            TrafficPriority::ScadaNormal => "AF21",
            TrafficPriority::Monitoring => "AF11",
            TrafficPriority::BestEffort => "BE",
        }
    }
}

/// How a class is realized in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStrategy {
    /// Master request, outstation response
    Poll,
    /// Short repeated bursts on a heartbeat period
    GooseBurst,
    Periodic,
    Echo,
    OneWayBurst,
    /// Select then operate, two request/response exchanges
    SelectBeforeOperate,
    Bulk,
}

impl AppStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            AppStrategy::Poll => "poll",
            AppStrategy::GooseBurst => "goose_burst",
            AppStrategy::Periodic => "periodic",
            AppStrategy::Echo => "echo",
            AppStrategy::OneWayBurst => "one_way_burst",
            AppStrategy::SelectBeforeOperate => "select_before_operate",
            AppStrategy::Bulk => "bulk",
        }
    }
}

/// Table row for a traffic class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassProfile {
    pub name: &'static str,
    pub strategy: AppStrategy,
    /// Default period; 0 when the class is not periodic
    pub interval_ms: u32,
    /// Request or message size; 0 when sized elsewhere
    pub size: u32,
    pub priority: TrafficPriority,
}

impl TrafficClass {
    pub fn profile(self) -> ClassProfile {
        use AppStrategy::*;
        use TrafficPriority::*;

        let (name, strategy, interval_ms, size, priority) = match self {
            TrafficClass::IntegrityPoll => ("INTEGRITY_POLL", Poll, 60_000, 0, ScadaNormal),
            TrafficClass::ExceptionPoll => ("EXCEPTION_POLL", Poll, 4_000, 0, ScadaHigh),
            TrafficClass::ProtectionMessage => ("PROTECTION_MESSAGE", GooseBurst, 1_000, 0, Protection),
            TrafficClass::Telemetry => ("TELEMETRY", Periodic, 1_000, 64, Monitoring),
            TrafficClass::Heartbeat => ("HEARTBEAT", Echo, 30_000, 20, Monitoring),
            TrafficClass::EventReport => ("EVENT_REPORT", OneWayBurst, 4_000, 128, ScadaHigh),
            TrafficClass::ControlCommand => ("CONTROL_COMMAND", SelectBeforeOperate, 500, 64, Control),
            TrafficClass::FileTransfer => ("FILE_TRANSFER", Bulk, 0, 0, BestEffort),
            TrafficClass::TimeSync => ("TIME_SYNC", Echo, 1_000, 48, Control),
        };
        ClassProfile { name, strategy, interval_ms, size, priority }
    }

    pub fn is_poll(self) -> bool {
        self.profile().strategy == AppStrategy::Poll
    }
}

impl fmt::Display for TrafficClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().name)
    }
}

/// Grid-specific part of a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridTrafficSpec {
    pub class: TrafficClass,
    /// Overrides the class priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TrafficPriority>,
    /// Overrides the target's scan class and the class default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u32>,
    /// Number of data points carried; sizes messages for polls and GOOSE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
}

impl GridTrafficSpec {
    pub fn new(class: TrafficClass) -> Self {
        Self { class, priority: None, interval_ms: None, points: None }
    }

    pub fn effective_priority(&self) -> TrafficPriority {
        self.priority.unwrap_or(self.class.profile().priority)
    }
}

/// DNP3 link + transport + application header bytes
const DNP3_HEADER: u32 = 10;
/// Object header bytes per group in a response
const DNP3_OBJECT_HEADER: u32 = 3;
/// GOOSE PDU overhead (Ethernet + APDU + dataset framing)
const GOOSE_OVERHEAD: u32 = 14 + 8 + 4;
const GOOSE_DEFAULT_ENTRIES: u32 = 8;
const EVENT_BYTES: u32 = 7;
const EVENT_DEFAULT_COUNT: u32 = 4;

/// One object group in a DNP3 response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectGroup {
    pub group: u8,
    pub count: u32,
    pub bytes_per_point: u32,
}

/// Binary inputs, analog inputs, counters
pub const INTEGRITY_GROUPS: [ObjectGroup; 3] = [
    ObjectGroup { group: 1, count: 32, bytes_per_point: 1 },
    ObjectGroup { group: 30, count: 32, bytes_per_point: 4 },
    ObjectGroup { group: 20, count: 8, bytes_per_point: 4 },
];

/// Class 1, 2 and 3 event objects
pub const EVENT_CLASS_GROUPS: u32 = 3;

/// Request carrying `objects` object headers
pub fn dnp3_request_size(objects: u32) -> u32 {
    DNP3_HEADER + 2 * objects
}

pub fn dnp3_response_size(groups: &[ObjectGroup]) -> u32 {
    DNP3_HEADER
        + groups
            .iter()
            .map(|g| g.count * g.bytes_per_point + DNP3_OBJECT_HEADER)
            .sum::<u32>()
}

/// (request, response) sizes for a poll of `class`
pub fn poll_sizes(class: TrafficClass, points: Option<u32>) -> (u32, u32) {
    match class {
        TrafficClass::IntegrityPoll => {
            let groups: Vec<ObjectGroup> = INTEGRITY_GROUPS
                .iter()
                .map(|g| ObjectGroup { count: points.unwrap_or(g.count), ..*g })
                .collect();
            (dnp3_request_size(groups.len() as u32), dnp3_response_size(&groups))
        }
        _ => {
            let events = ObjectGroup {
                group: 2,
                count: points.unwrap_or(EVENT_DEFAULT_COUNT),
                bytes_per_point: EVENT_BYTES,
            };
            (dnp3_request_size(EVENT_CLASS_GROUPS), dnp3_response_size(&[events]))
        }
    }
}

/// Size of one GOOSE message carrying `entries` dataset values
pub fn goose_size(entries: Option<u32>) -> u32 {
    GOOSE_OVERHEAD + 4 * entries.unwrap_or(GOOSE_DEFAULT_ENTRIES)
}
