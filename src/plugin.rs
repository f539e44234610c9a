//! Plugin context
//!
//! Owns everything a running instance needs: the mapping table, the listener
//! registry, the dispatch actor and the device monitor. Collaborators and the
//! device backend are injected, so the same context runs against real MIDI
//! hardware, a MOD-UI host or test fakes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::devices::{DeviceBackend, DeviceError, DeviceId};
use crate::dispatch::ActionDispatcher;
use crate::drivers::{PresetNavigator, SnapshotInventory};
use crate::mapping::MappingTable;
use crate::monitor::DeviceMonitor;
use crate::registry::ListenerRegistry;

pub struct Plugin {
    backend: Arc<dyn DeviceBackend>,
    mapping: Arc<MappingTable>,
    registry: Arc<ListenerRegistry>,
    dispatcher: ActionDispatcher,
    dispatcher_task: Option<JoinHandle<()>>,
    monitor_task: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    interval: Duration,
    verbose: bool,
}

impl Plugin {
    /// Build the context and spawn the dispatch actor
    ///
    /// No device is touched until [`Plugin::start`]. Must be called inside a
    /// tokio runtime.
    pub fn new(
        config: &AppConfig,
        navigator: Arc<dyn PresetNavigator>,
        inventory: Arc<dyn SnapshotInventory>,
        devices: Arc<dyn DeviceBackend>,
    ) -> Self {
        let mapping = Arc::new(MappingTable::from_config(&config.midi.snapshot));
        let (dispatcher, dispatcher_task) = ActionDispatcher::spawn(navigator, inventory);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            backend: devices,
            mapping,
            registry: Arc::new(ListenerRegistry::new()),
            dispatcher,
            dispatcher_task: Some(dispatcher_task),
            monitor_task: None,
            shutdown_tx,
            interval: config.monitor.interval(),
            verbose: config.verbose,
        }
    }

    /// Override the monitor polling interval from the config
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Build the context and start it
    pub fn register(
        config: &AppConfig,
        navigator: Arc<dyn PresetNavigator>,
        inventory: Arc<dyn SnapshotInventory>,
        devices: Arc<dyn DeviceBackend>,
    ) -> Result<Self, DeviceError> {
        let mut plugin = Self::new(config, navigator, inventory, devices);
        plugin.start()?;
        Ok(plugin)
    }

    /// Run the initial device scan and spawn the monitor
    ///
    /// Calling it again while running does nothing.
    pub fn start(&mut self) -> Result<(), DeviceError> {
        if self.monitor_task.is_some() {
            debug!("Plugin already started");
            return Ok(());
        }

        let mut monitor = DeviceMonitor::new(
            self.backend.clone(),
            self.registry.clone(),
            self.mapping.clone(),
            self.dispatcher.clone(),
            self.interval,
            self.verbose,
        );
        monitor.initial_scan()?;

        self.monitor_task = Some(tokio::spawn(monitor.run(self.shutdown_tx.subscribe())));
        info!(
            "✅ MIDI snapshot plugin started ({} binding(s), {} device(s))",
            self.mapping.len(),
            self.registry.len()
        );
        Ok(())
    }

    /// Stop the monitor, every listener and the dispatcher, in that order
    ///
    /// Returns once all of their tasks have exited.
    pub async fn stop(mut self) {
        info!("Stopping MIDI snapshot plugin...");
        self.shutdown_tx.send_replace(true);

        if let Some(task) = self.monitor_task.take() {
            if let Err(e) = task.await {
                warn!("Device monitor ended abnormally: {}", e);
            }
        }

        self.registry.retire_all().await;

        self.dispatcher.shutdown();
        if let Some(task) = self.dispatcher_task.take() {
            if let Err(e) = task.await {
                warn!("Dispatch actor ended abnormally: {}", e);
            }
        }

        info!("MIDI snapshot plugin stopped");
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    pub fn mapping(&self) -> &Arc<MappingTable> {
        &self.mapping
    }

    /// Devices with a live listener, sorted
    pub fn active_devices(&self) -> Vec<DeviceId> {
        self.registry.live_ids()
    }

    pub fn is_running(&self) -> bool {
        self.monitor_task.is_some()
    }
}

impl Drop for Plugin {
    fn drop(&mut self) {
        // Best effort when dropped without stop(); nothing is awaited here
        if self.monitor_task.is_some() || self.dispatcher_task.is_some() {
            self.shutdown_tx.send_replace(true);
            self.registry.close();
            self.dispatcher.shutdown();
        }
    }
}
