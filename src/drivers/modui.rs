//! MOD-UI driver - snapshot control over HTTP
//!
//! Talks to the host's snapshot endpoints:
//! - `GET /snapshot/name` → `{"ok": true, "name": "..."}` for the active snapshot
//! - `GET /snapshot/list` → `{"0": "Intro", "1": "Verse", ...}` in bank order
//! - `GET /snapshot/load?id=<n>` → `true` / `false`
//!
//! Preset navigation on this host is snapshot navigation: next/previous step
//! relative to the active snapshot and set loads by index.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::{step_snapshot, DriverError, PresetNavigator, SnapshotInventory, SnapshotStep};

/// HTTP client for a MOD-UI host
pub struct ModUiDriver {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SnapshotNameResponse {
    ok: bool,
    #[serde(default)]
    name: String,
}

/// Flatten the snapshot list, keeping the host's order
///
/// Relies on serde_json's `preserve_order`; a sorted map would put "10"
/// before "2".
fn ordered_entries(list: Map<String, Value>) -> Vec<(String, String)> {
    list.into_iter()
        .map(|(index, name)| {
            let name = match name {
                Value::String(name) => name,
                other => other.to_string(),
            };
            (index, name)
        })
        .collect()
}

impl ModUiDriver {
    /// Create a driver for the host at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DriverError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            name: format!("modui:{}", base_url),
            base_url,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn step(&self, step: SnapshotStep) -> Result<(), DriverError> {
        match step_snapshot(self, step).await? {
            Some((index, name)) => {
                info!("Snapshot {:?}: index {} -> {}", step, index, name);
            }
            None => {
                debug!("Active snapshot not in bank, {:?} ignored", step);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PresetNavigator for ModUiDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn increment_and_apply(&self) -> Result<(), DriverError> {
        self.step(SnapshotStep::Next).await
    }

    async fn decrement_and_apply(&self) -> Result<(), DriverError> {
        self.step(SnapshotStep::Previous).await
    }

    async fn set_and_apply(&self, index: u32) -> Result<(), DriverError> {
        self.load_snapshot(index).await
    }
}

#[async_trait]
impl SnapshotInventory for ModUiDriver {
    async fn current_snapshot_name(&self) -> Result<String, DriverError> {
        let response: SnapshotNameResponse = self
            .client
            .get(self.url("/snapshot/name"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // No active snapshot: an empty name matches nothing in the bank
        if !response.ok {
            debug!("{} reports no active snapshot", self.name);
            return Ok(String::new());
        }
        Ok(response.name)
    }

    async fn snapshot_inventory(&self) -> Result<Vec<(String, String)>, DriverError> {
        let list: Map<String, Value> = self
            .client
            .get(self.url("/snapshot/list"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let entries = ordered_entries(list);
        debug!("{} listed {} snapshot(s)", self.name, entries.len());
        Ok(entries)
    }

    async fn load_snapshot(&self, index: u32) -> Result<(), DriverError> {
        debug!("{} loading snapshot {}", self.name, index);

        let loaded: bool = self
            .client
            .get(self.url("/snapshot/load"))
            .query(&[("id", index)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !loaded {
            return Err(DriverError::Rejected(format!("snapshot {} was not loaded", index)));
        }
        Ok(())
    }
}
