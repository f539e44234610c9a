//! Per-device listener
//!
//! One task per connected device: receive decoded messages, look them up in the
//! mapping table and hand matched actions to the dispatcher. The task runs until
//! its stream ends or fails, or its stop signal fires.

use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::devices::{DeviceBackend, DeviceId, InputStream};
use crate::dispatch::ActionDispatcher;
use crate::mapping::MappingTable;
use crate::midi::DeviceMessage;
use crate::registry::ListenerRegistry;

/// Why a listener loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    Stopped,
    StreamEnded,
    StreamError,
    OpenFailed,
}

pub struct PortListener {
    pub device_id: DeviceId,
    pub backend: Arc<dyn DeviceBackend>,
    pub mapping: Arc<MappingTable>,
    pub dispatcher: ActionDispatcher,
    pub registry: Arc<ListenerRegistry>,
    pub generation: u64,
    pub verbose: bool,
}

impl PortListener {
    /// Listen until stopped, then drop this listener's registry entry
    pub async fn run(self, stop: oneshot::Receiver<()>) -> ListenerExit {
        let exit = match self.backend.open_input_stream(&self.device_id) {
            Ok(stream) => {
                info!("🎹 Listening on '{}'", self.device_id);
                self.receive(stream, stop).await
            }
            Err(e) => {
                warn!("Could not open '{}': {}", self.device_id, e);
                ListenerExit::OpenFailed
            }
        };

        if self.registry.remove_if_current(&self.device_id, self.generation) {
            debug!("Listener for '{}' removed its entry ({:?})", self.device_id, exit);
        }
        info!("Stopped listening on '{}' ({:?})", self.device_id, exit);
        exit
    }

    async fn receive(&self, mut stream: InputStream, mut stop: oneshot::Receiver<()>) -> ListenerExit {
        loop {
            tokio::select! {
                biased;

                _ = &mut stop => return ListenerExit::Stopped,

                item = stream.recv() => match item {
                    Some(Ok(message)) => self.handle_message(&message).await,
                    Some(Err(e)) => {
                        warn!("Read failed on '{}': {}", self.device_id, e);
                        return ListenerExit::StreamError;
                    }
                    None => return ListenerExit::StreamEnded,
                },
            }
        }
    }

    async fn handle_message(&self, message: &DeviceMessage) {
        let action = match self.mapping.lookup_message(message) {
            None => return,
            Some(Err(e)) => {
                error!("Skipping {} on '{}': {}", message, self.device_id, e);
                return;
            }
            Some(Ok(action)) => action,
        };

        if self.verbose {
            info!("{} on '{}' -> {}", message, self.device_id, action);
        } else {
            debug!("{} on '{}' -> {}", message, self.device_id, action);
        }

        // Awaited so messages from one device are dispatched in order
        if let Err(e) = self.dispatcher.dispatch(action).await {
            debug!("Dispatch from '{}' failed: {}", self.device_id, e);
        }
    }
}
