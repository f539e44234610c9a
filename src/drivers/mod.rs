//! Preset and snapshot collaborators
//!
//! The dispatcher only talks to the host through these two traits. Concrete
//! implementations live in the submodules:
//! - [`ConsoleDriver`]: in-memory snapshot bank that logs every call
//! - [`ModUiDriver`]: HTTP client for a MOD-UI host
//!
//! Note: All methods take &self so drivers can be shared as `Arc<dyn ...>`.
//! Drivers use interior mutability for their own state.

use async_trait::async_trait;
use thiserror::Error;

pub mod console;
pub mod modui;

pub use console::ConsoleDriver;
pub use modui::ModUiDriver;

/// Errors reported by a collaborator
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("host rejected request: {0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("snapshot index {index} out of range (bank has {count})")]
    OutOfRange { index: u32, count: usize },

    #[error("snapshot bank is empty")]
    EmptyBank,
}

/// Preset navigation on the host
#[async_trait]
pub trait PresetNavigator: Send + Sync {
    /// Driver name for logs
    fn name(&self) -> &str;

    /// Move to the next preset and apply it
    async fn increment_and_apply(&self) -> Result<(), DriverError>;

    /// Move to the previous preset and apply it
    async fn decrement_and_apply(&self) -> Result<(), DriverError>;

    /// Jump to a preset index and apply it
    async fn set_and_apply(&self, index: u32) -> Result<(), DriverError>;
}

/// Snapshot inventory of the host
///
/// The inventory is owned by the host and fetched on every call.
#[async_trait]
pub trait SnapshotInventory: Send + Sync {
    /// Display name of the active snapshot
    async fn current_snapshot_name(&self) -> Result<String, DriverError>;

    /// Ordered `(index, name)` pairs, in the host's order
    async fn snapshot_inventory(&self) -> Result<Vec<(String, String)>, DriverError>;

    /// Load a snapshot by index
    async fn load_snapshot(&self, index: u32) -> Result<(), DriverError>;
}

/// Direction for relative snapshot navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStep {
    Next,
    Previous,
}

/// Pick the entry next to `current` in `entries`, wrapping at both ends
///
/// Positions come from the order of the names, not the keys. Returns `None`
/// when `current` is not in the bank.
pub fn select_neighbour<'a>(
    entries: &'a [(String, String)],
    current: &str,
    step: SnapshotStep,
) -> Option<&'a (String, String)> {
    let position = entries.iter().position(|(_, name)| name == current)?;
    let count = entries.len();
    let target = match step {
        SnapshotStep::Next => (position + 1) % count,
        SnapshotStep::Previous => (position + count - 1) % count,
    };
    entries.get(target)
}

/// Load the snapshot next to the active one
///
/// Returns the loaded `(index, name)`, or `None` when the active snapshot is
/// not in the inventory.
pub async fn step_snapshot(
    inventory: &dyn SnapshotInventory,
    step: SnapshotStep,
) -> Result<Option<(u32, String)>, DriverError> {
    let current = inventory.current_snapshot_name().await?;
    let entries = inventory.snapshot_inventory().await?;

    let Some((key, name)) = select_neighbour(&entries, &current, step) else {
        return Ok(None);
    };

    let index = key
        .trim()
        .parse::<u32>()
        .map_err(|_| DriverError::InvalidResponse(format!("snapshot index '{}' is not a number", key)))?;

    inventory.load_snapshot(index).await?;
    Ok(Some((index, name.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> Vec<(String, String)> {
        vec![
            ("0".to_string(), "A".to_string()),
            ("1".to_string(), "B".to_string()),
            ("2".to_string(), "C".to_string()),
        ]
    }

    #[test]
    fn test_next_wraps_to_first() {
        let entries = bank();
        let picked = select_neighbour(&entries, "C", SnapshotStep::Next).unwrap();
        assert_eq!(picked, &("0".to_string(), "A".to_string()));
    }

    #[test]
    fn test_previous_wraps_to_last() {
        let entries = bank();
        let picked = select_neighbour(&entries, "A", SnapshotStep::Previous).unwrap();
        assert_eq!(picked, &("2".to_string(), "C".to_string()));
    }

    #[test]
    fn test_middle_steps() {
        let entries = bank();
        assert_eq!(select_neighbour(&entries, "B", SnapshotStep::Next).unwrap().1, "C");
        assert_eq!(select_neighbour(&entries, "B", SnapshotStep::Previous).unwrap().1, "A");
    }

    #[test]
    fn test_unknown_current_is_none() {
        let entries = bank();
        assert!(select_neighbour(&entries, "Z", SnapshotStep::Next).is_none());
        assert!(select_neighbour(&[], "A", SnapshotStep::Previous).is_none());
    }

    #[test]
    fn test_order_follows_values_not_keys() {
        // Host order differs from numeric key order
        let entries = vec![
            ("5".to_string(), "Intro".to_string()),
            ("1".to_string(), "Verse".to_string()),
            ("3".to_string(), "Chorus".to_string()),
        ];
        let picked = select_neighbour(&entries, "Intro", SnapshotStep::Next).unwrap();
        assert_eq!(picked.0, "1");
        let picked = select_neighbour(&entries, "Intro", SnapshotStep::Previous).unwrap();
        assert_eq!(picked.0, "3");
    }

    #[test]
    fn test_single_entry_wraps_to_itself() {
        let entries = vec![("0".to_string(), "Only".to_string())];
        assert_eq!(select_neighbour(&entries, "Only", SnapshotStep::Next).unwrap().1, "Only");
        assert_eq!(select_neighbour(&entries, "Only", SnapshotStep::Previous).unwrap().1, "Only");
    }
}
