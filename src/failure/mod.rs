//! Failure injection.
//!
//! This module contains the failure event model, scenarios holding events
//! in execution order, the scheduler that resolves a scenario into timed
//! apply/revert effects, and a set of scenario templates.

pub mod scenario;
pub mod scheduler;
pub mod templates;
pub mod types;

pub use scenario::FailureScenario;
pub use scheduler::{
    affected_ports, schedule, validate_scenario, Action, Effect, EffectPair, FailureSchedule, Phase, TimedEffect,
};
pub use types::{
    EventId, EventKind, EventParams, EventState, EventTarget, FailureCategory, FailureEvent, Severity, PERMANENT,
};
