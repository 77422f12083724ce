//! Resolving a flow into the concrete application it becomes.
//!
//! A grid class always wins over the generic application kind.

use log::debug;
use std::path::PathBuf;

use super::classes::{goose_size, poll_sizes, AppStrategy, TrafficClass, TrafficPriority};
use super::types::{ApplicationKind, Protocol, TrafficFlow};
use crate::error::{ModelError, Result};
use crate::topology::Node;
use crate::utils::rate::DataRate;

/// Burst transmit window for periodic and GOOSE strategies, seconds
const BURST_WINDOW: f64 = 0.001;
const GOOSE_REPEATS: u32 = 4;
const EVENT_REPORT_REPEATS: u32 = 3;
const SELECT_BEFORE_OPERATE_EXCHANGES: u32 = 2;

/// Application construct parameters, independent of output syntax
#[derive(Debug, Clone, PartialEq)]
pub enum AppPlan {
    /// Client sends `max_packets` requests every `interval`; server echoes
    Echo {
        interval: f64,
        packet_size: u32,
        /// Size a real outstation would answer with; informational only
        response_size: Option<u32>,
        max_packets: u32,
    },
    /// Sink on the target, on/off source on the source node
    OnOff {
        data_rate: DataRate,
        packet_size: u32,
        on_time: f64,
        off_time: f64,
        max_bytes: u64,
    },
    Bulk { packet_size: u32, max_bytes: u64 },
    Custom { symbol: String, source_file: PathBuf },
}

/// Everything the generator needs to emit one flow
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFlow {
    pub strategy: &'static str,
    pub protocol: Protocol,
    pub port: u16,
    pub priority: Option<TrafficPriority>,
    pub plan: AppPlan,
}

impl ResolvedFlow {
    /// ToS byte to set on the sending socket, if marked
    pub fn tos(&self) -> Option<u8> {
        self.priority.map(TrafficPriority::tos)
    }
}

impl TrafficFlow {
    /// Decide how this flow is realized; `target` supplies grid scan classes.
    pub fn resolve(&self, target: Option<&Node>) -> Result<ResolvedFlow> {
        match &self.grid {
            Some(spec) => {
                let profile = spec.class.profile();
                let interval_ms = spec.interval_ms.unwrap_or_else(|| {
                    let scan = target
                        .and_then(|n| n.grid.as_ref())
                        .and_then(|g| g.scan_class)
                        .map(|s| s.interval_ms())
                        .filter(|ms| *ms > 0);
                    match (spec.class.is_poll(), scan) {
                        (true, Some(ms)) => ms,
                        _ => profile.interval_ms,
                    }
                });
                debug!("{} resolved as {} every {}ms", self.id, spec.class, interval_ms);
                let plan = self.class_plan(spec.class, profile.strategy, profile.size, interval_ms, spec.points);
                let protocol = if profile.strategy == AppStrategy::Bulk { Protocol::Tcp } else { Protocol::Udp };
                Ok(ResolvedFlow {
                    strategy: profile.strategy.as_str(),
                    protocol,
                    port: self.effective_port(),
                    priority: Some(spec.effective_priority()),
                    plan,
                })
            }
            None => self.generic_plan(),
        }
    }

    fn class_plan(
        &self,
        class: TrafficClass,
        strategy: AppStrategy,
        size: u32,
        interval_ms: u32,
        points: Option<u32>,
    ) -> AppPlan {
        let interval = f64::from(interval_ms.max(1)) / 1000.0;
        match strategy {
            AppStrategy::Poll => {
                let (request, response) = poll_sizes(class, points);
                AppPlan::Echo {
                    interval,
                    packet_size: request,
                    response_size: Some(response),
                    max_packets: self.packets_in_window(interval),
                }
            }
            AppStrategy::Echo => AppPlan::Echo {
                interval,
                packet_size: size,
                response_size: None,
                max_packets: self.packets_in_window(interval),
            },
            AppStrategy::SelectBeforeOperate => AppPlan::Echo {
                interval,
                packet_size: size,
                response_size: None,
                max_packets: SELECT_BEFORE_OPERATE_EXCHANGES,
            },
            AppStrategy::GooseBurst => burst(goose_size(points), GOOSE_REPEATS, interval),
            AppStrategy::Periodic => burst(size, 1, interval),
            AppStrategy::OneWayBurst => burst(size, EVENT_REPORT_REPEATS, interval),
            AppStrategy::Bulk => AppPlan::Bulk {
                packet_size: self.params.packet_size,
                max_bytes: self.params.max_bytes,
            },
        }
    }

    fn generic_plan(&self) -> Result<ResolvedFlow> {
        let unsupported = |reason: &str| ModelError::UnsupportedApplication {
            flow: self.id,
            kind: self.application.label().to_string(),
            reason: reason.to_string(),
        };
        let params = &self.params;
        let (protocol, plan) = match &self.application {
            ApplicationKind::Echo => (
                Protocol::Udp,
                AppPlan::Echo {
                    interval: params.interval,
                    packet_size: params.packet_size,
                    response_size: None,
                    max_packets: params.max_packets,
                },
            ),
            ApplicationKind::OnOff => (
                self.protocol,
                AppPlan::OnOff {
                    data_rate: params.data_rate,
                    packet_size: params.packet_size,
                    on_time: params.on_time,
                    off_time: params.off_time,
                    max_bytes: params.max_bytes,
                },
            ),
            ApplicationKind::BulkSend => {
                if self.protocol != Protocol::Tcp {
                    return Err(unsupported("bulk transfer needs a connection-oriented transport"));
                }
                (
                    Protocol::Tcp,
                    AppPlan::Bulk { packet_size: params.packet_size, max_bytes: params.max_bytes },
                )
            }
            ApplicationKind::Ping => {
                return Err(unsupported("ping flows have no complete parameter semantics"));
            }
            ApplicationKind::Custom { symbol, source_file } => {
                if !is_identifier(symbol) {
                    return Err(unsupported("handler symbol is not a Python identifier"));
                }
                (
                    self.protocol,
                    AppPlan::Custom { symbol: symbol.clone(), source_file: source_file.clone() },
                )
            }
        };
        Ok(ResolvedFlow {
            strategy: self.application.label(),
            protocol,
            port: self.effective_port(),
            priority: None,
            plan,
        })
    }

    fn packets_in_window(&self, interval: f64) -> u32 {
        let window = (self.stop - self.start).max(0.0);
        ((window / interval).floor() as u32).max(1)
    }
}

fn is_identifier(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `repeats` back-to-back packets once per `interval`
fn burst(size: u32, repeats: u32, interval: f64) -> AppPlan {
    let on_time = BURST_WINDOW * f64::from(repeats);
    let bits_per_window = u64::from(size) * 8;
    AppPlan::OnOff {
        data_rate: DataRate::from_bps(((bits_per_window as f64) / BURST_WINDOW).round() as u64),
        packet_size: size,
        on_time,
        off_time: (interval - on_time).max(0.0),
        max_bytes: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{GridAttributes, NodeAttrs, NodeId, NodeKind, ScanClass, TopologyModel};
    use crate::traffic::{FlowId, GridTrafficSpec};

    fn outstation(scan: ScanClass) -> (TopologyModel, NodeId) {
        let mut model = TopologyModel::new();
        let grid = GridAttributes { scan_class: Some(scan), ..GridAttributes::default() };
        let rtu = model.add_node(NodeKind::Rtu, NodeAttrs::named("rtu").with_grid(grid));
        (model, rtu)
    }

    #[test]
    fn test_poll_takes_scan_class_interval() {
        let (model, rtu) = outstation(ScanClass::Class2);
        let flow = TrafficFlow::grid(FlowId(1), NodeId(9), rtu, GridTrafficSpec::new(TrafficClass::IntegrityPoll))
            .with_window(0.0, 20.0);
        let resolved = flow.resolve(model.node(rtu).ok()).unwrap();
        assert_eq!(resolved.strategy, "poll");
        assert_eq!(resolved.port, 20_000);
        assert_eq!(resolved.tos(), Some(18 << 2));
        assert_eq!(
            resolved.plan,
            AppPlan::Echo { interval: 4.0, packet_size: 16, response_size: Some(211), max_packets: 5 }
        );
    }

    #[test]
    fn test_exception_scan_falls_back_to_class_default() {
        let (model, rtu) = outstation(ScanClass::Exception);
        let flow = TrafficFlow::grid(FlowId(1), NodeId(9), rtu, GridTrafficSpec::new(TrafficClass::IntegrityPoll))
            .with_window(0.0, 120.0);
        let resolved = flow.resolve(model.node(rtu).ok()).unwrap();
        let AppPlan::Echo { interval, max_packets, .. } = resolved.plan else {
            panic!("expected echo plan");
        };
        assert_eq!(interval, 60.0);
        assert_eq!(max_packets, 2);
    }

    #[test]
    fn test_class_overrides_application_kind() {
        let mut flow = TrafficFlow::grid(FlowId(2), NodeId(1), NodeId(2), GridTrafficSpec::new(TrafficClass::FileTransfer));
        flow.application = ApplicationKind::Ping;
        let resolved = flow.resolve(None).unwrap();
        assert_eq!(resolved.protocol, Protocol::Tcp);
        assert!(matches!(resolved.plan, AppPlan::Bulk { .. }));
    }

    #[test]
    fn test_goose_burst_plan() {
        let flow = TrafficFlow::grid(FlowId(3), NodeId(1), NodeId(2), GridTrafficSpec::new(TrafficClass::ProtectionMessage));
        let resolved = flow.resolve(None).unwrap();
        assert_eq!(resolved.priority, Some(TrafficPriority::Protection));
        let AppPlan::OnOff { packet_size, data_rate, on_time, .. } = resolved.plan else {
            panic!("expected on/off plan");
        };
        assert_eq!(packet_size, 58);
        assert_eq!(data_rate, DataRate::from_bps(464_000));
        assert!((on_time - 0.004).abs() < 1e-12);
    }

    #[test]
    fn test_ping_and_udp_bulk_are_rejected() {
        let ping = TrafficFlow::new(FlowId(4), NodeId(1), NodeId(2), ApplicationKind::Ping);
        assert!(matches!(
            ping.resolve(None),
            Err(ModelError::UnsupportedApplication { kind, .. }) if kind == "ping"
        ));

        let bulk = TrafficFlow::new(FlowId(5), NodeId(1), NodeId(2), ApplicationKind::BulkSend);
        assert!(bulk.resolve(None).is_err());

        let mut tcp_bulk = bulk.clone();
        tcp_bulk.protocol = Protocol::Tcp;
        assert_eq!(tcp_bulk.resolve(None).unwrap().strategy, "bulk_send");
    }

    #[test]
    fn test_custom_handler_symbol_must_be_importable() {
        let handler = |symbol: &str| ApplicationKind::Custom {
            symbol: symbol.to_string(),
            source_file: PathBuf::from("handlers/modbus.py"),
        };
        let good = TrafficFlow::new(FlowId(6), NodeId(1), NodeId(2), handler("ModbusPoller"));
        assert!(matches!(good.resolve(None).unwrap().plan, AppPlan::Custom { .. }));

        let bad = TrafficFlow::new(FlowId(7), NodeId(1), NodeId(2), handler("modbus.Poller()"));
        assert!(matches!(
            bad.resolve(None),
            Err(ModelError::UnsupportedApplication { kind, .. }) if kind == "custom"
        ));
    }
}
