//! Commands for the dispatch actor
//!
//! Every command carries a oneshot channel for its result, so the caller can
//! await completion and keep per-device ordering.

use tokio::sync::oneshot;

use super::DispatchError;
use crate::drivers::SnapshotStep;
use crate::mapping::Action;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, DispatchError>>;

pub(crate) enum DispatchCommand {
    /// Run a mapped action on the preset navigator
    Dispatch { action: Action, response: Reply<()> },

    /// Load the snapshot next to the active one
    StepSnapshot {
        step: SnapshotStep,
        response: Reply<Option<(u32, String)>>,
    },

    /// Load a snapshot by index
    LoadSnapshot { index: u32, response: Reply<()> },

    /// Stop the actor
    Shutdown,
}

impl std::fmt::Debug for DispatchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchCommand::Dispatch { action, .. } => write!(f, "Dispatch({})", action),
            DispatchCommand::StepSnapshot { step, .. } => write!(f, "StepSnapshot({:?})", step),
            DispatchCommand::LoadSnapshot { index, .. } => write!(f, "LoadSnapshot({})", index),
            DispatchCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}
