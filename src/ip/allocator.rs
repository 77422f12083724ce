//! Address allocation.
//!
//! One subnet per broadcast domain, host addresses handed out in
//! (node, port) order inside each domain. The same topology always
//! yields the same plan.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::domains::broadcast_domains;
use super::registry::AddressRegistry;
use crate::error::{ModelError, Result};
use crate::topology::{Endpoint, InterfaceAddress, LinkId, TopologyModel};
use crate::utils::ip_utils::{host_capacity, nth_subnet};

/// Where subnets are carved from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPolicy {
    #[serde(default = "default_base")]
    pub base: Ipv4Addr,
    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,
}

fn default_base() -> Ipv4Addr {
    Ipv4Addr::new(10, 1, 0, 0)
}

fn default_prefix_len() -> u8 {
    24
}

impl Default for AddressPolicy {
    fn default() -> Self {
        Self { base: default_base(), prefix_len: default_prefix_len() }
    }
}

/// Addresses handed out in one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetAssignment {
    pub domain: usize,
    pub subnet: Ipv4Addr,
    pub prefix_len: u8,
    pub links: Vec<LinkId>,
    pub hosts: Vec<(Endpoint, Ipv4Addr)>,
}

/// Result of planning addresses for a whole topology
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressPlan {
    pub subnets: Vec<SubnetAssignment>,
}

impl AddressPlan {
    pub fn address_of(&self, endpoint: Endpoint) -> Option<Ipv4Addr> {
        self.subnets
            .iter()
            .flat_map(|s| s.hosts.iter())
            .find(|(ep, _)| *ep == endpoint)
            .map(|(_, ip)| *ip)
    }

    pub fn host_count(&self) -> usize {
        self.subnets.iter().map(|s| s.hosts.len()).sum()
    }
}

/// Work out addresses for every host-bearing port without touching the model
pub fn plan_addresses(model: &TopologyModel, policy: &AddressPolicy) -> Result<AddressPlan> {
    let capacity = host_capacity(policy.prefix_len);
    let mut registry = AddressRegistry::new();
    let mut plan = AddressPlan::default();

    for domain in broadcast_domains(model, false) {
        if domain.members.is_empty() {
            debug!("Domain {} has no address-bearing ports, skipping", domain.index);
            continue;
        }
        let exhausted = |available: usize| ModelError::AddressSpaceExhausted {
            domain: domain.index,
            needed: domain.members.len(),
            available,
            prefix_len: policy.prefix_len,
        };
        if domain.members.len() > capacity {
            return Err(exhausted(capacity));
        }
        let subnet = nth_subnet(policy.base, policy.prefix_len, plan.subnets.len()).ok_or_else(|| exhausted(0))?;

        let mut hosts = Vec::with_capacity(domain.members.len());
        for member in &domain.members {
            let ip = registry
                .next_host(subnet, policy.prefix_len, *member)
                .map_err(|_| exhausted(capacity))?;
            hosts.push((*member, ip));
        }
        debug!("Domain {} -> {}/{} ({} hosts)", domain.index, subnet, policy.prefix_len, hosts.len());

        plan.subnets.push(SubnetAssignment {
            domain: domain.index,
            subnet,
            prefix_len: policy.prefix_len,
            links: domain.links.clone(),
            hosts,
        });
    }

    Ok(plan)
}

impl TopologyModel {
    /// Allocate one subnet per broadcast domain and bind host addresses.
    ///
    /// Every previous address is replaced. On error nothing changes.
    pub fn assign_addresses(&mut self, policy: &AddressPolicy) -> Result<AddressPlan> {
        let plan = plan_addresses(self, policy)?;

        for node in self.nodes.values_mut() {
            for port in &mut node.ports {
                port.address = None;
            }
        }
        for subnet in &plan.subnets {
            for (endpoint, ip) in &subnet.hosts {
                if let Some(port) = self.nodes.get_mut(&endpoint.node).and_then(|n| n.port_mut(endpoint.port)) {
                    port.address = Some(InterfaceAddress { ip: *ip, prefix_len: subnet.prefix_len });
                }
            }
        }
        self.touch();

        info!(
            "Assigned {} addresses across {} subnets from {}/{}",
            plan.host_count(),
            plan.subnets.len(),
            policy.base,
            policy.prefix_len
        );
        Ok(plan)
    }

    /// Connected ports on non-bridge nodes that still lack an address
    pub fn unaddressed_ports(&self) -> Vec<Endpoint> {
        self.nodes()
            .filter(|n| !n.kind().is_bridge())
            .flat_map(|n| {
                n.connected_ports()
                    .filter(|p| p.address.is_none())
                    .map(move |p| Endpoint::new(n.id(), p.index))
            })
            .collect()
    }

    pub fn is_fully_addressed(&self) -> bool {
        self.unaddressed_ports().is_empty()
    }
}
