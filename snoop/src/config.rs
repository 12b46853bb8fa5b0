//! Configuration module

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::model::{ModelOptions, TRAFFIC_INTERVAL_NS};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Capture settings
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Capture in promiscuous mode
    #[serde(default = "default_true")]
    pub promiscuous: bool,

    /// Maximum frame size to capture
    #[serde(default = "default_snap_length")]
    pub snap_length: usize,

    /// Bound on the number of live UDP sessions
    #[serde(default = "default_session_cache_size")]
    pub session_cache_size: usize,
}

/// Topology inference settings
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Attach newly discovered MACs to the first network seen rather than
    /// opening a network per orphan MAC
    #[serde(default = "default_true")]
    pub assume_one_lan: bool,

    /// Milliseconds between traffic rollup events
    #[serde(default = "default_traffic_interval")]
    pub traffic_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_true() -> bool { true }
fn default_snap_length() -> usize { 1600 }
fn default_session_cache_size() -> usize { 4096 }
fn default_traffic_interval() -> u64 { (TRAFFIC_INTERVAL_NS / 1_000_000) as u64 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            promiscuous: true,
            snap_length: default_snap_length(),
            session_cache_size: default_session_cache_size(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            assume_one_lan: true,
            traffic_interval_ms: default_traffic_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        toml::from_str(&content).with_context(|| "Failed to parse configuration")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.capture.snap_length < 64 || self.capture.snap_length > 65535 {
            anyhow::bail!("Snap length must be between 64 and 65535");
        }

        if self.capture.session_cache_size == 0 {
            anyhow::bail!("Session cache size must be at least 1");
        }

        if self.model.traffic_interval_ms == 0 {
            anyhow::bail!("Traffic interval must be at least 1 ms");
        }

        if self.logging.format != "pretty" && self.logging.format != "json" {
            anyhow::bail!(
                "Invalid log format: {}. Must be 'pretty' or 'json'",
                self.logging.format
            );
        }

        Ok(())
    }

    /// The model options this configuration selects
    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            assume_one_lan: self.model.assume_one_lan,
            traffic_interval_ns: self.model.traffic_interval_ms as i64 * 1_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[capture]
promiscuous = false
snap_length = 2048
session_cache_size = 128

[model]
assume_one_lan = false
traffic_interval_ms = 25

[logging]
level = "debug"
format = "pretty"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(!config.capture.promiscuous);
        assert_eq!(config.capture.snap_length, 2048);
        assert_eq!(config.capture.session_cache_size, 128);
        assert!(!config.model.assume_one_lan);
        assert_eq!(config.model.traffic_interval_ms, 25);
        assert!(config.validate().is_ok());

        let options = config.model_options();
        assert!(!options.assume_one_lan);
        assert_eq!(options.traffic_interval_ns, 25_000_000);
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.capture.promiscuous);
        assert_eq!(config.capture.snap_length, 1600);
        assert!(config.model.assume_one_lan);
        assert_eq!(config.model.traffic_interval_ms, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_snap_length() {
        let config: Config = toml::from_str("[capture]\nsnap_length = 1\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let config: Config = toml::from_str("[logging]\nformat = \"xml\"\n").unwrap();
        assert!(config.validate().is_err());
    }
}
