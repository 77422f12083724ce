//! Delay parsing utilities.
//!
//! This module parses propagation-delay strings in the notation the
//! simulation engine accepts (e.g. "2ms", "0.1ms", "270ms", "5us") and
//! formats them back without loss.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A propagation delay with nanosecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Delay {
    nanos: u64,
}

impl Delay {
    pub const ZERO: Delay = Delay { nanos: 0 };

    pub const fn from_nanos(nanos: u64) -> Self {
        Delay { nanos }
    }

    pub const fn from_micros(micros: u64) -> Self {
        Delay { nanos: micros * 1_000 }
    }

    pub const fn from_millis(millis: u64) -> Self {
        Delay { nanos: millis * NANOS_PER_MILLI }
    }

    /// Build from fractional seconds, rounded to the nearest nanosecond.
    pub fn from_secs_f64(secs: f64) -> Self {
        Delay { nanos: (secs.max(0.0) * NANOS_PER_SEC as f64).round() as u64 }
    }

    pub fn as_nanos(&self) -> u64 {
        self.nanos
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.nanos as f64 / NANOS_PER_SEC as f64
    }
}

impl fmt::Display for Delay {
    /// Always rendered in milliseconds, with only the decimals needed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.nanos / NANOS_PER_MILLI;
        let frac = self.nanos % NANOS_PER_MILLI;
        if frac == 0 {
            return write!(f, "{}ms", whole);
        }
        let digits = format!("{:06}", frac);
        write!(f, "{}.{}ms", whole, digits.trim_end_matches('0'))
    }
}

impl TryFrom<String> for Delay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_delay(&value)
    }
}

impl From<Delay> for String {
    fn from(value: Delay) -> Self {
        value.to_string()
    }
}

/// Match: "<number><unit>" with an optional s/ms/us/ns unit
static DELAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)\s*(s|sec|ms|us|ns)?$")
        .expect("Invalid delay regex")
});

/// Parse a delay string (e.g. "2ms", "0.1ms", "1.5s", "10us") into a [`Delay`]
///
/// A bare number is taken as seconds, matching the engine's Time parser.
///
/// # Examples
/// ```
/// use gridnetsim::utils::duration::{parse_delay, Delay};
///
/// assert_eq!(parse_delay("2ms"), Ok(Delay::from_millis(2)));
/// assert_eq!(parse_delay("0.1ms"), Ok(Delay::from_micros(100)));
/// assert!(parse_delay("fast").is_err());
/// ```
pub fn parse_delay(delay: &str) -> Result<Delay, String> {
    let delay = delay.trim();
    let caps = DELAY_PATTERN
        .captures(delay)
        .ok_or_else(|| format!("Invalid delay format: {}", delay))?;

    let value: f64 = caps[1]
        .parse()
        .map_err(|_| format!("Invalid delay value: {}", delay))?;

    let scale = match caps.get(2).map(|m| m.as_str()) {
        None | Some("s") | Some("sec") => NANOS_PER_SEC as f64,
        Some("ms") => NANOS_PER_MILLI as f64,
        Some("us") => 1_000.0,
        Some("ns") => 1.0,
        Some(other) => return Err(format!("Unknown delay unit '{}' in {}", other, delay)),
    };

    Ok(Delay::from_nanos((value * scale).round() as u64))
}
