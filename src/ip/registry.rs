//! Address registry.
//!
//! This file tracks which address is bound to which port so that no
//! address is handed out twice, and keeps a per-subnet counter for
//! sequential host allocation.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::topology::Endpoint;
use crate::utils::ip_utils::{host_address, host_capacity};

/// Registry of assigned interface addresses
#[derive(Debug, Default)]
pub struct AddressRegistry {
    /// Address -> owning port
    assigned: HashMap<Ipv4Addr, Endpoint>,
    /// Last host number handed out per subnet
    subnet_counters: HashMap<Ipv4Addr, u32>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next free host address in `subnet` to `owner`
    pub fn next_host(&mut self, subnet: Ipv4Addr, prefix_len: u8, owner: Endpoint) -> Result<Ipv4Addr, String> {
        let capacity = host_capacity(prefix_len) as u32;
        let counter = self.subnet_counters.entry(subnet).or_insert(0);

        while *counter < capacity {
            *counter += 1;
            let ip = host_address(subnet, *counter);
            if !self.assigned.contains_key(&ip) {
                self.assigned.insert(ip, owner);
                return Ok(ip);
            }
        }
        Err(format!("Subnet {}/{} has no free host address for {}", subnet, prefix_len, owner))
    }

    /// Record an address that was chosen elsewhere
    ///
    /// Fails when another port already holds the address.
    pub fn register(&mut self, ip: Ipv4Addr, owner: Endpoint) -> Result<(), Endpoint> {
        match self.assigned.get(&ip) {
            Some(existing) if *existing != owner => Err(*existing),
            _ => {
                self.assigned.insert(ip, owner);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::NodeId;

    #[test]
    fn test_sequential_hosts() {
        let mut registry = AddressRegistry::new();
        let subnet = Ipv4Addr::new(10, 1, 0, 0);
        let a = Endpoint::new(NodeId(1), 0);
        let b = Endpoint::new(NodeId(2), 0);

        assert_eq!(registry.next_host(subnet, 24, a), Ok(Ipv4Addr::new(10, 1, 0, 1)));
        assert_eq!(registry.next_host(subnet, 24, b), Ok(Ipv4Addr::new(10, 1, 0, 2)));
        assert_eq!(registry.register(Ipv4Addr::new(10, 1, 0, 2), a), Err(b));
        assert_eq!(registry.next_host(subnet, 24, a), Ok(Ipv4Addr::new(10, 1, 0, 3)));
    }

    #[test]
    fn test_skips_registered_and_exhausts() {
        let mut registry = AddressRegistry::new();
        let subnet = Ipv4Addr::new(10, 1, 0, 0);
        let pinned = Endpoint::new(NodeId(9), 0);
        registry.register(Ipv4Addr::new(10, 1, 0, 1), pinned).unwrap();

        let a = Endpoint::new(NodeId(1), 0);
        assert_eq!(registry.next_host(subnet, 30, a), Ok(Ipv4Addr::new(10, 1, 0, 2)));
        assert!(registry.next_host(subnet, 30, Endpoint::new(NodeId(2), 0)).is_err());
        assert_eq!(registry.register(Ipv4Addr::new(10, 1, 0, 2), pinned), Err(a));
    }
}
