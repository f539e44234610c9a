//! In-memory fakes for the device layer and the collaborators

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::devices::{
    DeviceBackend, DeviceError, DeviceSet, InputStream, OpenStreams, PortInstances, StreamItem,
};
use crate::drivers::{DriverError, PresetNavigator, SnapshotInventory};
use crate::midi::DeviceMessage;

/// Poll `condition` until it holds, panicking after two seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within 2s");
}

#[derive(Default)]
struct FakeDevices {
    /// Visible devices and their current port instance
    present: BTreeMap<String, u64>,
    next_instance: u64,
    streams: HashMap<String, mpsc::UnboundedSender<StreamItem>>,
    failing: HashSet<String>,
    opens: HashMap<String, usize>,
}

/// Device backend driven by the test
///
/// Like midir, every open stream is tracked by port instance and enumeration
/// fails the streams whose port vanished or was replaced.
#[derive(Default)]
pub struct FakeDeviceBackend {
    devices: Mutex<FakeDevices>,
    tracked: OpenStreams,
    fail_enumeration: AtomicBool,
}

impl FakeDeviceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `id` visible under a fresh port instance
    pub fn plug(&self, id: &str) {
        let mut devices = self.devices.lock();
        devices.next_instance += 1;
        let instance = devices.next_instance;
        devices.present.insert(id.to_string(), instance);
    }

    /// Remove the device and close its open stream
    pub fn unplug(&self, id: &str) {
        let mut devices = self.devices.lock();
        devices.present.remove(id);
        devices.streams.remove(id);
        self.tracked.forget(id);
    }

    /// Unplug and replug `id` between two enumerations
    ///
    /// The old stream stays open, the way a midir connection keeps its
    /// callback alive on a dead port.
    pub fn replug(&self, id: &str) {
        self.plug(id);
    }

    pub fn send(&self, id: &str, message: DeviceMessage) {
        if let Some(tx) = self.devices.lock().streams.get(id) {
            let _ = tx.send(Ok(message));
        }
    }

    /// Push a read error into the open stream of `id`
    pub fn fail_stream(&self, id: &str) {
        if let Some(tx) = self.devices.lock().streams.get(id) {
            let _ = tx.send(Err(DeviceError::Read {
                id: id.to_string(),
                reason: "simulated read failure".to_string(),
            }));
        }
    }

    pub fn fail_open(&self, id: &str, failing: bool) {
        let mut devices = self.devices.lock();
        if failing {
            devices.failing.insert(id.to_string());
        } else {
            devices.failing.remove(id);
        }
    }

    pub fn fail_enumeration(&self, failing: bool) {
        self.fail_enumeration.store(failing, Ordering::SeqCst);
    }

    /// True while a listener holds the device's stream
    pub fn is_stream_open(&self, id: &str) -> bool {
        self.devices
            .lock()
            .streams
            .get(id)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Open attempts for `id`, failed ones included
    pub fn open_count(&self, id: &str) -> usize {
        self.devices.lock().opens.get(id).copied().unwrap_or(0)
    }
}

impl DeviceBackend for FakeDeviceBackend {
    fn list_available_device_ids(&self) -> Result<DeviceSet, DeviceError> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(DeviceError::Backend("enumeration disabled".to_string()));
        }

        let instances: PortInstances = self
            .devices
            .lock()
            .present
            .iter()
            .map(|(id, instance)| (id.clone(), instance.to_string()))
            .collect();
        self.tracked.end_stale(&instances);

        Ok(instances.into_keys().collect())
    }

    fn open_input_stream(&self, id: &str) -> Result<InputStream, DeviceError> {
        let mut devices = self.devices.lock();
        *devices.opens.entry(id.to_string()).or_default() += 1;

        if devices.failing.contains(id) {
            return Err(DeviceError::Open {
                id: id.to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        let Some(instance) = devices.present.get(id).copied() else {
            return Err(DeviceError::NotFound(id.to_string()));
        };

        let (tx, rx) = self.tracked.open(id, instance.to_string());
        devices.streams.insert(id.to_string(), tx);
        Ok(InputStream::new(rx))
    }
}

#[derive(Default)]
struct Recorded {
    calls: Vec<String>,
    loaded: Vec<u32>,
    current: String,
}

/// Collaborator that records every call and serves a fixed snapshot bank
pub struct RecordingDriver {
    bank: Vec<(String, String)>,
    state: Mutex<Recorded>,
    failing: AtomicBool,
}

impl RecordingDriver {
    /// Bank keyed "0", "1", ... with the first name active
    pub fn with_bank(names: &[&str]) -> Self {
        let bank: Vec<(String, String)> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (i.to_string(), name.to_string()))
            .collect();
        let current = names.first().map(|s| s.to_string()).unwrap_or_default();
        Self {
            bank,
            state: Mutex::new(Recorded {
                current,
                ..Default::default()
            }),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_current(&self, name: &str) {
        self.state.lock().current = name.to_string();
    }

    /// Navigator calls in order, e.g. `next`, `previous`, `set:5`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Snapshot indexes passed to `load_snapshot`
    pub fn loaded(&self) -> Vec<u32> {
        self.state.lock().loaded.clone()
    }

    fn record(&self, call: String) -> Result<(), DriverError> {
        self.state.lock().calls.push(call);
        self.check()
    }

    fn check(&self) -> Result<(), DriverError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(DriverError::Rejected("simulated failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PresetNavigator for RecordingDriver {
    fn name(&self) -> &str {
        "recording"
    }

    async fn increment_and_apply(&self) -> Result<(), DriverError> {
        self.record("next".to_string())
    }

    async fn decrement_and_apply(&self) -> Result<(), DriverError> {
        self.record("previous".to_string())
    }

    async fn set_and_apply(&self, index: u32) -> Result<(), DriverError> {
        self.record(format!("set:{}", index))
    }
}

#[async_trait]
impl SnapshotInventory for RecordingDriver {
    async fn current_snapshot_name(&self) -> Result<String, DriverError> {
        self.check()?;
        Ok(self.state.lock().current.clone())
    }

    async fn snapshot_inventory(&self) -> Result<Vec<(String, String)>, DriverError> {
        self.check()?;
        Ok(self.bank.clone())
    }

    async fn load_snapshot(&self, index: u32) -> Result<(), DriverError> {
        self.check()?;
        let mut state = self.state.lock();
        state.loaded.push(index);
        if let Some((_, name)) = self.bank.get(index as usize) {
            state.current = name.clone();
        }
        Ok(())
    }
}
