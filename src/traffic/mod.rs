//! Traffic flows layered on top of the topology.
//!
//! Generic flows name an application kind directly. Grid flows carry a
//! traffic class which decides the application, its timing, message sizes
//! and QoS marking.

pub mod classes;
pub mod resolve;
pub mod types;

pub use classes::{AppStrategy, ClassProfile, GridTrafficSpec, TrafficClass, TrafficPriority};
pub use resolve::{AppPlan, ResolvedFlow};
pub use types::{AppParams, ApplicationKind, FlowId, Protocol, TrafficFlow, DEFAULT_PORT, GRID_PORT};
