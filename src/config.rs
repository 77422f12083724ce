//! Simulation settings carried by a project file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ip::AddressPolicy;
use crate::utils::validation::{
    validate_log_level, validate_prefix_len, validate_sim_duration, validate_simulation_seed,
};

/// Name of the flow statistics file the generated program writes
pub const RESULTS_FILE: &str = "flowmon-results.xml";

/// General simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Simulated seconds
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_true")]
    pub flow_monitor: bool,
    #[serde(default)]
    pub pcap: bool,
    #[serde(default)]
    pub ascii_trace: bool,
    #[serde(default = "default_random_seed")]
    pub random_seed: u32,
    /// Log level of the emitted application log components
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub addressing: AddressPolicy,
}

fn default_duration() -> f64 {
    10.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("ns3_output")
}

fn default_true() -> bool {
    true
}

fn default_random_seed() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            output_dir: default_output_dir(),
            flow_monitor: true,
            pcap: false,
            ascii_trace: false,
            random_seed: default_random_seed(),
            log_level: default_log_level(),
            addressing: AddressPolicy::default(),
        }
    }
}

impl GeneralConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_sim_duration(self.duration).map_err(ValidationError::InvalidGeneral)?;
        validate_simulation_seed(self.random_seed).map_err(ValidationError::InvalidGeneral)?;
        validate_prefix_len(self.addressing.prefix_len).map_err(ValidationError::InvalidGeneral)?;
        validate_log_level(&self.log_level).map_err(ValidationError::InvalidGeneral)?;
        if self.output_dir.as_os_str().is_empty() {
            return Err(ValidationError::InvalidGeneral("output_dir cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Where the flow monitor report lands
    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(RESULTS_FILE)
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid flow configuration: {0}")]
    InvalidFlow(String),
    #[error("Invalid failure scenario: {0}")]
    InvalidScenario(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_defaults() {
        let config: GeneralConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, GeneralConfig::default());
        assert_eq!(config.duration, 10.0);
        assert!(config.flow_monitor);
        assert_eq!(config.results_path(), PathBuf::from("ns3_output/flowmon-results.xml"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_general_rejects_bad_settings() {
        let bad_duration = GeneralConfig { duration: 0.0, ..GeneralConfig::default() };
        assert!(matches!(bad_duration.validate(), Err(ValidationError::InvalidGeneral(_))));

        let bad_seed = GeneralConfig { random_seed: 0, ..GeneralConfig::default() };
        assert!(bad_seed.validate().is_err());

        let mut bad_prefix = GeneralConfig::default();
        bad_prefix.addressing.prefix_len = 31;
        let err = bad_prefix.validate().unwrap_err();
        assert!(err.to_string().contains("prefix"));

        let bad_level = GeneralConfig { log_level: "verbose".to_string(), ..GeneralConfig::default() };
        assert!(bad_level.validate().is_err());
    }
}
