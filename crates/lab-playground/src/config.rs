//! Playground configuration.
//!
//! Stored as JSON in the user config directory and overridable through
//! environment variables. Loading never fails; missing or corrupt files
//! fall back to defaults with a warning.

use log::warn;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the playground and its backend clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabConfig {
    /// Base URL of the execution service.
    #[serde(default = "default_execution_url")]
    pub execution_url: String,

    /// Base URL of the agent service.
    #[serde(default = "default_agent_url")]
    pub agent_url: String,

    /// Total execute attempts per cell run (first try plus retries).
    #[serde(default = "default_execute_attempts")]
    pub execute_attempts: u32,

    /// Fixed delay between execute retries, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Interval between background health probes, in seconds.
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
}

fn default_execution_url() -> String {
    "http://127.0.0.1:8400".to_string()
}

fn default_agent_url() -> String {
    "http://127.0.0.1:8500".to_string()
}

fn default_execute_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    750
}

fn default_health_interval_secs() -> u64 {
    10
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            execution_url: default_execution_url(),
            agent_url: default_agent_url(),
            execute_attempts: default_execute_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            health_interval_secs: default_health_interval_secs(),
        }
    }
}

/// Get the path to the config file.
fn config_path() -> PathBuf {
    // Allow override for testing
    if let Ok(path) = std::env::var("LAB_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lab-playground")
        .join("config.json")
}

/// Load config from disk, then apply environment overrides.
pub fn load_config() -> LabConfig {
    let mut config = match std::fs::read_to_string(config_path()) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!("[config] failed to parse config, using defaults: {e}");
                LabConfig::default()
            }
        },
        Err(_) => LabConfig::default(),
    };

    if let Ok(url) = std::env::var("LAB_EXECUTION_URL") {
        config.execution_url = url;
    }
    if let Ok(url) = std::env::var("LAB_AGENT_URL") {
        config.agent_url = url;
    }

    config
}
