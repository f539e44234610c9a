//! Configuration management for midi-snapshot
//!
//! Handles loading and validating the YAML configuration file. A missing file
//! is not an error: the plugin starts with no bindings and keeps listening.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Log every matched message at info level
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

/// MIDI binding configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MidiConfig {
    #[serde(default)]
    pub snapshot: SnapshotMapConfig,
}

/// Message bindings, keyed by `"<channel 1-16>:<number>"`
///
/// Values are action strings: `next`, `previous` or `load:<index>`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SnapshotMapConfig {
    #[serde(default)]
    pub cc: BTreeMap<String, String>,
    #[serde(default)]
    pub pc: BTreeMap<String, String>,
}

/// Device monitor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Which collaborator backs preset and snapshot navigation
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Console,
    Modui,
}

/// Preset/snapshot driver configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverConfig {
    #[serde(default = "default_driver_kind")]
    pub kind: DriverKind,
    /// Base URL of the MOD-UI host
    #[serde(default = "default_modui_url")]
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Snapshot bank for the console driver
    #[serde(default)]
    pub snapshots: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: default_driver_kind(),
            url: default_modui_url(),
            timeout_ms: default_timeout_ms(),
            snapshots: Vec::new(),
        }
    }
}

impl DriverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    ///
    /// Falls back to the default configuration when the file does not exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "No configuration file found at {}, starting without bindings",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))
            }
        };

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document is treated like an absent file
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.monitor.interval_secs == 0 {
            anyhow::bail!("monitor.interval_secs must be greater than 0");
        }

        if self.driver.kind == DriverKind::Modui {
            if self.driver.url.trim().is_empty() {
                anyhow::bail!("driver.url cannot be empty for the modui driver");
            }
            if self.driver.timeout_ms == 0 {
                anyhow::bail!("driver.timeout_ms must be greater than 0");
            }
        }

        Ok(())
    }

    /// Settings that load fine but leave the plugin unable to do anything useful
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.driver.kind == DriverKind::Console && self.driver.snapshots.is_empty() {
            warnings.push(
                "console driver has no snapshots (driver.snapshots is empty), every action will fail"
                    .to_string(),
            );
        }

        warnings
    }
}

// Default value functions
fn default_interval_secs() -> u64 { 5 }
fn default_driver_kind() -> DriverKind { DriverKind::Console }
fn default_modui_url() -> String { "http://127.0.0.1:80".to_string() }
fn default_timeout_ms() -> u64 { 2000 }
