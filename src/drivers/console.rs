//! Console driver - in-memory snapshot bank that logs every call
//!
//! Useful for running without a host, for checking bindings against real
//! hardware and for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{DriverError, PresetNavigator, SnapshotInventory};

/// ConsoleDriver keeps a named snapshot bank and an active index
pub struct ConsoleDriver {
    name: String,
    snapshots: Vec<String>,
    /// Index of the active snapshot
    current: Mutex<usize>,
    /// Execution counter for debugging
    execution_count: Mutex<u64>,
}

impl ConsoleDriver {
    /// Create a ConsoleDriver over a snapshot bank
    ///
    /// The first snapshot starts active.
    pub fn new(name: impl Into<String>, snapshots: Vec<String>) -> Self {
        Self {
            name: name.into(),
            snapshots,
            current: Mutex::new(0),
            execution_count: Mutex::new(0),
        }
    }

    /// Index of the active snapshot
    pub fn current_index(&self) -> usize {
        *self.current.lock()
    }

    pub fn execution_count(&self) -> u64 {
        *self.execution_count.lock()
    }

    /// Activate `index` and log it
    fn apply(&self, index: usize, reason: &str) -> Result<(), DriverError> {
        let name = self.snapshots.get(index).ok_or(DriverError::OutOfRange {
            index: index as u32,
            count: self.snapshots.len(),
        })?;

        *self.current.lock() = index;

        let exec_num = {
            let mut count = self.execution_count.lock();
            *count += 1;
            *count
        };

        info!(
            "🎛️  ConsoleDriver '{}' {} → snapshot {} '{}' [exec #{}]",
            self.name, reason, index, name, exec_num
        );
        Ok(())
    }

    fn step(&self, forward: bool) -> Result<usize, DriverError> {
        let count = self.snapshots.len();
        if count == 0 {
            return Err(DriverError::EmptyBank);
        }
        let current = *self.current.lock();
        Ok(if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        })
    }
}

#[async_trait]
impl PresetNavigator for ConsoleDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn increment_and_apply(&self) -> Result<(), DriverError> {
        let index = self.step(true)?;
        self.apply(index, "next")
    }

    async fn decrement_and_apply(&self) -> Result<(), DriverError> {
        let index = self.step(false)?;
        self.apply(index, "previous")
    }

    async fn set_and_apply(&self, index: u32) -> Result<(), DriverError> {
        self.apply(index as usize, "set")
    }
}

#[async_trait]
impl SnapshotInventory for ConsoleDriver {
    async fn current_snapshot_name(&self) -> Result<String, DriverError> {
        let current = *self.current.lock();
        self.snapshots
            .get(current)
            .cloned()
            .ok_or(DriverError::EmptyBank)
    }

    async fn snapshot_inventory(&self) -> Result<Vec<(String, String)>, DriverError> {
        debug!("ConsoleDriver '{}' listing {} snapshot(s)", self.name, self.snapshots.len());
        Ok(self
            .snapshots
            .iter()
            .enumerate()
            .map(|(index, name)| (index.to_string(), name.clone()))
            .collect())
    }

    async fn load_snapshot(&self, index: u32) -> Result<(), DriverError> {
        self.apply(index as usize, "load")
    }
}
