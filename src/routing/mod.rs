//! Per-node routing tables and automatic route derivation.

pub mod compute;
pub mod types;

pub use compute::{derive_routes, RouteSummary};
pub use types::{RouteEntry, RouteKind, RoutingMode, RoutingTable};
