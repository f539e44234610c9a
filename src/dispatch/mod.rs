//! Action dispatch
//!
//! All collaborator calls run on a single actor task, so preset and snapshot
//! operations from different devices never overlap. Listeners hold a cloneable
//! [`ActionDispatcher`] handle and await each result, which keeps per-device
//! ordering intact.

mod actor;
mod commands;

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::drivers::{DriverError, PresetNavigator, SnapshotInventory, SnapshotStep};
use crate::mapping::Action;

use actor::DispatchActor;
use commands::DispatchCommand;

/// Recoverable dispatch failures
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: String,
        #[source]
        source: DriverError,
    },

    #[error("dispatcher is not running")]
    Closed,
}

/// Handle to the dispatch actor
#[derive(Clone)]
pub struct ActionDispatcher {
    cmd_tx: mpsc::UnboundedSender<DispatchCommand>,
}

impl ActionDispatcher {
    /// Spawn the dispatch actor over the given collaborators
    ///
    /// Returns the handle and the actor's task, which ends after
    /// [`ActionDispatcher::shutdown`] or once every handle is dropped.
    pub fn spawn(
        navigator: Arc<dyn PresetNavigator>,
        inventory: Arc<dyn SnapshotInventory>,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(DispatchActor::new(navigator, inventory, cmd_rx).run());
        (Self { cmd_tx }, task)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, DispatchError>>) -> DispatchCommand,
    ) -> Result<T, DispatchError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(response_tx))
            .map_err(|_| DispatchError::Closed)?;
        response_rx.await.map_err(|_| DispatchError::Closed)?
    }

    /// Run a mapped action against the preset navigator
    pub async fn dispatch(&self, action: Action) -> Result<(), DispatchError> {
        self.request(|response| DispatchCommand::Dispatch { action, response })
            .await
    }

    /// Load the snapshot after the active one, wrapping to the first
    ///
    /// Returns the loaded `(index, name)`, or `None` when the active snapshot
    /// is not in the inventory.
    pub async fn load_next_snapshot(&self) -> Result<Option<(u32, String)>, DispatchError> {
        self.request(|response| DispatchCommand::StepSnapshot {
            step: SnapshotStep::Next,
            response,
        })
        .await
    }

    /// Load the snapshot before the active one, wrapping to the last
    pub async fn load_previous_snapshot(&self) -> Result<Option<(u32, String)>, DispatchError> {
        self.request(|response| DispatchCommand::StepSnapshot {
            step: SnapshotStep::Previous,
            response,
        })
        .await
    }

    /// Load a snapshot by index
    pub async fn load_snapshot(&self, index: u32) -> Result<(), DispatchError> {
        self.request(|response| DispatchCommand::LoadSnapshot { index, response })
            .await
    }

    /// Ask the actor to stop after the commands already queued
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(DispatchCommand::Shutdown);
    }
}
