//! Validation utilities.
//!
//! This module provides the settings checks used while loading a project
//! and the structural validation a snapshot must pass before any script
//! text is generated.

use log::debug;

use crate::error::Violation;
use crate::failure::validate_scenario;
use crate::ip::AddressRegistry;
use crate::project::ModelSnapshot;
use crate::routing::RoutingMode;
use crate::topology::Endpoint;

/// Log levels accepted for the generated program's log components
pub const LOG_LEVELS: [&str; 8] = ["none", "error", "warn", "info", "debug", "function", "logic", "all"];

/// Validate the simulated duration in seconds
///
/// # Examples
/// ```
/// use gridnetsim::utils::validation::validate_sim_duration;
///
/// assert!(validate_sim_duration(10.0).is_ok());
/// assert!(validate_sim_duration(0.0).is_err());
/// ```
pub fn validate_sim_duration(duration: f64) -> Result<(), String> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(format!("duration must be a positive number of seconds, got {}", duration));
    }
    Ok(())
}

/// Validate the RNG seed. ns-3 rejects a zero seed.
pub fn validate_simulation_seed(seed: u32) -> Result<(), String> {
    if seed == 0 {
        return Err("random_seed must be non-zero".to_string());
    }
    debug!("Validated simulation seed: {}", seed);
    Ok(())
}

/// Validate the subnet prefix length used for address allocation
///
/// /31 and /32 leave no room for a broadcast domain with two hosts,
/// anything shorter than /8 is almost certainly a typo.
pub fn validate_prefix_len(prefix_len: u8) -> Result<(), String> {
    if !(8..=30).contains(&prefix_len) {
        return Err(format!("addressing prefix length must be within 8..=30, got /{}", prefix_len));
    }
    Ok(())
}

pub fn validate_log_level(level: &str) -> Result<(), String> {
    if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Err(format!("unknown log level '{}', expected one of {}", level, LOG_LEVELS.join(", ")));
    }
    Ok(())
}

/// Validate a flow's start/stop window
pub fn validate_flow_window(start: f64, stop: f64) -> Result<(), String> {
    if !start.is_finite() || !stop.is_finite() || start < 0.0 {
        return Err(format!("window [{}, {}] must be finite and start at or after 0", start, stop));
    }
    if stop <= start {
        return Err(format!("stop time {} must be after start time {}", stop, start));
    }
    Ok(())
}

pub fn validate_likelihood(likelihood: f64) -> Result<(), String> {
    if !(0.0..=1.0).contains(&likelihood) {
        return Err(format!("likelihood must be within 0..=1, got {}", likelihood));
    }
    Ok(())
}

/// Every structural problem that would make generation from `snapshot` unsound
///
/// Checks:
/// - link endpoints reference existing ports that point back at the link
/// - every connected port on a non-bridge node has an address
/// - no address is bound to two ports
/// - manual routes leave through connected ports
/// - flows reference existing, distinct, addressed nodes and a sane window
/// - the failure scenario (when `with_failures`) targets existing entities
pub fn validate_snapshot(snapshot: &ModelSnapshot, with_failures: bool) -> Vec<Violation> {
    let model = &snapshot.topology;
    let mut violations = Vec::new();

    for link in model.links() {
        for endpoint in link.endpoints() {
            let attached = model.port(endpoint).and_then(|p| p.link()) == Some(link.id());
            if !attached {
                violations.push(Violation::LinkEndpointMissing {
                    link: link.id(),
                    node: endpoint.node,
                    port: endpoint.port,
                });
            }
        }
    }

    let mut registry = AddressRegistry::new();
    for node in model.nodes().filter(|n| !n.kind().is_bridge()) {
        for port in node.connected_ports() {
            let endpoint = Endpoint::new(node.id(), port.index);
            match port.address {
                None => violations.push(Violation::PortUnaddressed { node: node.id(), port: port.index }),
                Some(address) => {
                    if let Err(first) = registry.register(address.ip, endpoint) {
                        violations.push(Violation::DuplicateAddress { ip: address.ip, first, second: endpoint });
                    }
                }
            }
        }
    }

    for node in model.nodes().filter(|n| !n.kind().is_bridge()) {
        if node.routing.mode != RoutingMode::Manual {
            continue;
        }
        for entry in node.routing.manual_entries().iter().filter(|e| e.enabled) {
            if !node.port(entry.interface).is_some_and(|p| p.is_connected()) {
                violations.push(Violation::RouteInterfaceMissing { node: node.id(), port: entry.interface });
            }
        }
    }

    for flow in &snapshot.flows {
        let mut endpoints_exist = true;
        for (field, node) in [("source", flow.source), ("target", flow.target)] {
            if model.node(node).is_err() {
                endpoints_exist = false;
                violations.push(Violation::FlowEndpointMissing { flow: flow.id, field, node });
            }
        }
        if flow.source == flow.target {
            violations.push(Violation::FlowSelfTarget { flow: flow.id, node: flow.source });
        } else if endpoints_exist {
            let addressed = model.node(flow.target).map(|n| n.primary_address().is_some()).unwrap_or(false);
            if !addressed {
                violations.push(Violation::FlowTargetUnaddressed { flow: flow.id, node: flow.target });
            }
        }
        if validate_flow_window(flow.start, flow.stop).is_err() {
            violations.push(Violation::FlowWindow { flow: flow.id, start: flow.start, stop: flow.stop });
        }
    }

    if with_failures {
        if let Some(scenario) = &snapshot.scenario {
            violations.extend(validate_scenario(scenario, model));
        }
    }

    debug!("Snapshot validation found {} violation(s)", violations.len());
    violations
}
