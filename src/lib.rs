//! midi-snapshot
//!
//! Listens on every connected MIDI input device, follows devices as they are
//! plugged and unplugged, and turns configured Control Change and Program
//! Change messages into preset and snapshot navigation on a host.

pub mod config;
pub mod devices;
pub mod dispatch;
pub mod drivers;
pub mod listener;
pub mod mapping;
pub mod midi;
pub mod monitor;
pub mod paths;
pub mod plugin;
pub mod registry;

#[cfg(test)]
mod testing;

pub use config::AppConfig;
pub use devices::{DeviceBackend, DeviceError, MidirBackend};
pub use dispatch::{ActionDispatcher, DispatchError};
pub use drivers::{PresetNavigator, SnapshotInventory};
pub use mapping::{Action, MappingTable};
pub use plugin::Plugin;
