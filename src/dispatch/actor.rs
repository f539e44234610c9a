//! DispatchActor - serialized collaborator calls
//!
//! Owns the preset navigator and snapshot inventory and processes commands
//! one at a time. Collaborator failures are logged here and handed back to
//! the caller as recoverable errors; they never stop the actor.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use super::commands::DispatchCommand;
use super::DispatchError;
use crate::drivers::{step_snapshot, PresetNavigator, SnapshotInventory, SnapshotStep};
use crate::mapping::Action;

pub(crate) struct DispatchActor {
    navigator: Arc<dyn PresetNavigator>,
    inventory: Arc<dyn SnapshotInventory>,
    command_rx: mpsc::UnboundedReceiver<DispatchCommand>,
    /// Counter for tracking total commands processed
    processed: u64,
}

impl DispatchActor {
    pub(crate) fn new(
        navigator: Arc<dyn PresetNavigator>,
        inventory: Arc<dyn SnapshotInventory>,
        command_rx: mpsc::UnboundedReceiver<DispatchCommand>,
    ) -> Self {
        Self {
            navigator,
            inventory,
            command_rx,
            processed: 0,
        }
    }

    /// Process commands until shutdown or until every handle is dropped
    pub(crate) async fn run(mut self) {
        debug!("Dispatch actor started (navigator: {})", self.navigator.name());

        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing command");

            match cmd {
                DispatchCommand::Dispatch { action, response } => {
                    let result = self.handle_dispatch(action).await;
                    let _ = response.send(result);
                }
                DispatchCommand::StepSnapshot { step, response } => {
                    let result = self.handle_step(step).await;
                    let _ = response.send(result);
                }
                DispatchCommand::LoadSnapshot { index, response } => {
                    let result = self.handle_load(index).await;
                    let _ = response.send(result);
                }
                DispatchCommand::Shutdown => {
                    debug!("Dispatch actor received shutdown command");
                    break;
                }
            }
            self.processed += 1;
        }

        info!("Dispatch actor stopped ({} commands processed)", self.processed);
    }

    async fn handle_dispatch(&self, action: Action) -> Result<(), DispatchError> {
        let result = match action {
            Action::Next => self.navigator.increment_and_apply().await,
            Action::Previous => self.navigator.decrement_and_apply().await,
            Action::LoadIndex(index) => self.navigator.set_and_apply(index).await,
        };

        result.map_err(|source| {
            error!("Failed to execute action {}: {}", action, source);
            DispatchError::Collaborator {
                operation: format!("action {}", action),
                source,
            }
        })
    }

    async fn handle_step(&self, step: SnapshotStep) -> Result<Option<(u32, String)>, DispatchError> {
        match step_snapshot(self.inventory.as_ref(), step).await {
            Ok(Some((index, name))) => {
                info!("Snapshot {:?}: index {} -> {}", step, index, name);
                Ok(Some((index, name)))
            }
            Ok(None) => {
                debug!("Active snapshot not in inventory, {:?} skipped", step);
                Ok(None)
            }
            Err(source) => {
                error!("Failed to load {:?} snapshot: {}", step, source);
                Err(DispatchError::Collaborator {
                    operation: format!("{:?} snapshot", step),
                    source,
                })
            }
        }
    }

    async fn handle_load(&self, index: u32) -> Result<(), DispatchError> {
        info!("Loading snapshot index: {}", index);
        self.inventory.load_snapshot(index).await.map_err(|source| {
            error!("Failed to load snapshot {}: {}", index, source);
            DispatchError::Collaborator {
                operation: format!("load snapshot {}", index),
                source,
            }
        })
    }
}
