//! Shared utilities: rate and delay parsing, validation, IP helpers, script output.

pub mod duration;
pub mod ip_utils;
pub mod rate;
pub mod script;
pub mod validation;

pub use duration::{parse_delay, Delay};
pub use rate::{parse_data_rate, DataRate};
pub use script::{script_path, write_script};
pub use validation::validate_snapshot;
