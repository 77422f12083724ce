//! Data-rate parsing utilities.
//!
//! Accepts the engine's DataRate notation ("1Gbps", "500kb/s", "19200bps",
//! "1MB/s") and renders rates back in the largest exact unit.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// A link or application data rate in bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataRate {
    bps: u64,
}

impl DataRate {
    pub const fn from_bps(bps: u64) -> Self {
        DataRate { bps }
    }

    pub const fn from_kbps(kbps: u64) -> Self {
        DataRate { bps: kbps * 1_000 }
    }

    pub const fn from_mbps(mbps: u64) -> Self {
        DataRate { bps: mbps * 1_000_000 }
    }

    pub const fn from_gbps(gbps: u64) -> Self {
        DataRate { bps: gbps * 1_000_000_000 }
    }

    pub fn as_bps(&self) -> u64 {
        self.bps
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bps = self.bps;
        if bps != 0 && bps % 1_000_000_000 == 0 {
            write!(f, "{}Gbps", bps / 1_000_000_000)
        } else if bps != 0 && bps % 1_000_000 == 0 {
            write!(f, "{}Mbps", bps / 1_000_000)
        } else if bps != 0 && bps % 1_000 == 0 {
            write!(f, "{}kbps", bps / 1_000)
        } else {
            write!(f, "{}bps", bps)
        }
    }
}

impl TryFrom<String> for DataRate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_data_rate(&value)
    }
}

impl From<DataRate> for String {
    fn from(value: DataRate) -> Self {
        value.to_string()
    }
}

/// Match: "<number>[k|K|M|G](b|B)[ps|/s]"
static RATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]*\.?[0-9]+)\s*(?:([kKMG]?)(b|B)(?:ps|/s)?)?$")
        .expect("Invalid data rate regex")
});

/// Parse a data-rate string into a [`DataRate`]
///
/// Lowercase `b` counts bits and uppercase `B` bytes; `k`/`K`, `M` and `G`
/// are decimal multipliers. A bare number is bits per second.
///
/// # Examples
/// ```
/// use gridnetsim::utils::rate::{parse_data_rate, DataRate};
///
/// assert_eq!(parse_data_rate("1Gbps"), Ok(DataRate::from_gbps(1)));
/// assert_eq!(parse_data_rate("500kb/s"), Ok(DataRate::from_kbps(500)));
/// assert!(parse_data_rate("quick").is_err());
/// ```
pub fn parse_data_rate(rate: &str) -> Result<DataRate, String> {
    let rate = rate.trim();
    let caps = RATE_PATTERN
        .captures(rate)
        .ok_or_else(|| format!("Invalid data rate format: {}", rate))?;

    let value: f64 = caps[1]
        .parse()
        .map_err(|_| format!("Invalid data rate value: {}", rate))?;

    let multiplier = match caps.get(2).map(|m| m.as_str()).unwrap_or("") {
        "" => 1.0,
        "k" | "K" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        other => return Err(format!("Unknown rate prefix '{}' in {}", other, rate)),
    };
    let unit = match caps.get(3).map(|m| m.as_str()) {
        Some("B") => 8.0,
        _ => 1.0,
    };

    Ok(DataRate::from_bps((value * multiplier * unit).round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_rate_units() {
        assert_eq!(parse_data_rate("1Gbps"), Ok(DataRate::from_gbps(1)));
        assert_eq!(parse_data_rate("100Mbps"), Ok(DataRate::from_mbps(100)));
        assert_eq!(parse_data_rate("19200bps"), Ok(DataRate::from_bps(19_200)));
        assert_eq!(parse_data_rate("250kbps"), Ok(DataRate::from_kbps(250)));
        assert_eq!(parse_data_rate("500kb/s"), Ok(DataRate::from_kbps(500)));
        assert_eq!(parse_data_rate("1.5Mbps"), Ok(DataRate::from_kbps(1_500)));
        assert_eq!(parse_data_rate("1MB/s"), Ok(DataRate::from_mbps(8)));
        assert_eq!(parse_data_rate("9600"), Ok(DataRate::from_bps(9_600)));

        assert!(parse_data_rate("").is_err());
        assert!(parse_data_rate("Mbps").is_err());
        assert!(parse_data_rate("10Tbps").is_err());
    }

    #[test]
    fn test_data_rate_display_uses_largest_exact_unit() {
        assert_eq!(DataRate::from_gbps(1).to_string(), "1Gbps");
        assert_eq!(DataRate::from_kbps(1_500).to_string(), "1500kbps");
        assert_eq!(DataRate::from_bps(19_200).to_string(), "19200bps");
        assert_eq!(DataRate::from_bps(115_200).to_string(), "115200bps");
        assert_eq!(DataRate::from_bps(0).to_string(), "0bps");
    }
}
