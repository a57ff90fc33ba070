use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::measurement::MacAddr;

pub const DEFAULT_CONFIG_PATH: &str = "mirrorbench.toml";
const FALLBACK_DATABASE_URL: &str = "sqlite://mirrorbench.sqlite?mode=rwc";

/// One speed in Mbit/s per transmit interface, in transmit-interface order.
pub type SpeedPattern = Vec<u64>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Debug, Clone)]
pub struct MirrorBenchConfig {
    #[serde(default = "default_generator_address")]
    pub generator_address: String,

    pub capture_interface: String,
    pub transmit_interfaces: Vec<String>,

    #[serde(default)]
    pub mirrored_interfaces: Vec<String>,

    pub interface_macs: BTreeMap<String, MacAddr>,

    #[serde(default = "default_frame_sizes")]
    pub frame_sizes: Vec<u32>,

    pub speed_pattern_sets: BTreeMap<String, Vec<SpeedPattern>>,

    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,

    #[serde(default = "default_measure_secs")]
    pub measure_secs: u64,

    #[serde(default = "default_accepted_tx_diff")]
    pub accepted_tx_diff: u64,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_generator_address() -> String {
    "http://127.0.0.1:7878".to_string()
}

fn default_frame_sizes() -> Vec<u32> {
    vec![64, 128, 256, 512, 1024, 1280, 1518]
}

fn default_warmup_secs() -> u64 {
    5
}

fn default_measure_secs() -> u64 {
    10
}

fn default_accepted_tx_diff() -> u64 {
    1
}

fn default_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| FALLBACK_DATABASE_URL.to_string())
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl MirrorBenchConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: MirrorBenchConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the relations between fields that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid(message));

        if self.transmit_interfaces.len() < 2 {
            return invalid(format!(
                "at least two transmit interfaces are required, got {}",
                self.transmit_interfaces.len()
            ));
        }

        let mut seen = HashSet::new();
        for name in &self.transmit_interfaces {
            if !seen.insert(name.as_str()) {
                return invalid(format!("transmit interface '{name}' is listed twice"));
            }
            if !self.interface_macs.contains_key(name) {
                return invalid(format!("no MAC address configured for '{name}'"));
            }
        }
        if seen.contains(self.capture_interface.as_str()) {
            return invalid(format!(
                "capture interface '{}' cannot also transmit",
                self.capture_interface
            ));
        }
        if let Some(name) = self
            .mirrored_interfaces
            .iter()
            .find(|name| !seen.contains(name.as_str()))
        {
            return invalid(format!("mirrored interface '{name}' is not a transmit interface"));
        }

        if self.frame_sizes.is_empty() || self.frame_sizes.contains(&0) {
            return invalid("frame sizes must be a non-empty list of positive lengths".to_string());
        }

        if self.speed_pattern_sets.is_empty() {
            return invalid("no speed pattern sets configured".to_string());
        }
        for (set_name, patterns) in &self.speed_pattern_sets {
            if patterns.is_empty() {
                return invalid(format!("speed pattern set '{set_name}' is empty"));
            }
            for pattern in patterns {
                if pattern.is_empty() || pattern.len() > self.transmit_interfaces.len() {
                    return invalid(format!(
                        "speed pattern {pattern:?} in set '{set_name}' needs 1 to {} entries",
                        self.transmit_interfaces.len()
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn is_mirrored(&self, interface_name: &str) -> bool {
        self.mirrored_interfaces
            .iter()
            .any(|name| name == interface_name)
    }

    pub fn mac_of(&self, interface_name: &str) -> Result<MacAddr, ConfigError> {
        self.interface_macs
            .get(interface_name)
            .copied()
            .ok_or_else(|| ConfigError::Invalid(format!("no MAC address configured for '{interface_name}'")))
    }
}
