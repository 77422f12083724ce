//! IP address allocation and management module.
//!
//! This module splits the topology into broadcast domains, carves one
//! subnet per domain out of the configured address policy, and keeps a
//! registry so no address is handed out twice.

pub mod allocator;
pub mod domains;
pub mod registry;

// Re-export commonly used types
pub use allocator::{plan_addresses, AddressPlan, AddressPolicy, SubnetAssignment};
pub use domains::{broadcast_domains, BroadcastDomain};
pub use registry::AddressRegistry;
