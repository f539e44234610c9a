//! Device monitor
//!
//! Keeps the listener set in line with the devices the backend can see:
//! one initial scan, then a polling loop that starts listeners for new
//! devices and retires those whose device went away.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::devices::{DeviceBackend, DeviceError, DeviceSet};
use crate::dispatch::ActionDispatcher;
use crate::listener::PortListener;
use crate::mapping::MappingTable;
use crate::registry::ListenerRegistry;

/// Outcome of one polling cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub appeared: DeviceSet,
    pub disappeared: DeviceSet,
    /// Listeners spawned this cycle, including restarts
    pub started: usize,
}

pub struct DeviceMonitor {
    backend: Arc<dyn DeviceBackend>,
    registry: Arc<ListenerRegistry>,
    mapping: Arc<MappingTable>,
    dispatcher: ActionDispatcher,
    interval: Duration,
    verbose: bool,
    known: DeviceSet,
}

impl DeviceMonitor {
    pub fn new(
        backend: Arc<dyn DeviceBackend>,
        registry: Arc<ListenerRegistry>,
        mapping: Arc<MappingTable>,
        dispatcher: ActionDispatcher,
        interval: Duration,
        verbose: bool,
    ) -> Self {
        Self {
            backend,
            registry,
            mapping,
            dispatcher,
            interval,
            verbose,
            known: DeviceSet::new(),
        }
    }

    /// Devices seen by the last successful enumeration
    pub fn known_devices(&self) -> &DeviceSet {
        &self.known
    }

    /// Spawn a listener for `id` unless one is live
    pub fn start_listener(&self, id: &str) -> bool {
        let listener_registry = self.registry.clone();
        let backend = self.backend.clone();
        let mapping = self.mapping.clone();
        let dispatcher = self.dispatcher.clone();
        let verbose = self.verbose;
        let device_id = id.to_string();

        self.registry.start_with(id, move |generation, stop| async move {
            let listener = PortListener {
                device_id,
                backend,
                mapping,
                dispatcher,
                registry: listener_registry,
                generation,
                verbose,
            };
            listener.run(stop).await;
        })
    }

    /// Enumerate once and start a listener per device
    ///
    /// Fails if the backend cannot enumerate.
    pub fn initial_scan(&mut self) -> Result<(), DeviceError> {
        let current = self.backend.list_available_device_ids()?;
        info!("🔍 Found {} MIDI input device(s)", current.len());

        for id in &current {
            debug!("  - {}", id);
            self.start_listener(id);
        }
        self.known = current;
        Ok(())
    }

    /// Run one polling cycle
    ///
    /// An enumeration failure is logged and the cycle skipped.
    pub async fn poll_once(&mut self) -> CycleReport {
        let current = match self.backend.list_available_device_ids() {
            Ok(current) => current,
            Err(e) => {
                warn!("Device enumeration failed, skipping cycle: {}", e);
                return CycleReport::default();
            }
        };

        let appeared: DeviceSet = current.difference(&self.known).cloned().collect();
        let disappeared: DeviceSet = self.known.difference(&current).cloned().collect();

        for id in &appeared {
            info!("🔌 Device connected: {}", id);
        }

        for id in &disappeared {
            info!("Device disconnected: {}", id);
            if self.registry.retire(id).await {
                debug!("Retired listener for {}", id);
            }
        }

        // Covers new devices and restarts listeners that died
        let started = current.iter().filter(|id| self.start_listener(id)).count();

        self.known = current;
        CycleReport {
            appeared,
            disappeared,
            started,
        }
    }

    /// Poll until `shutdown` turns true or its sender is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        debug!("Device monitor polling every {:?}", self.interval);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.poll_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Device monitor stopped");
    }
}
