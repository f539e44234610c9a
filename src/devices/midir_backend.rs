//! midir-backed device layer
//!
//! Each opened stream owns its own `MidiInputConnection`; the connection
//! callback decodes raw bytes and forwards them into the stream's channel.
//! Since the callback holds the sender, a stream never closes by itself when
//! the port goes away. Every enumeration compares port ids against the ones
//! recorded at open time and fails the streams whose port is gone.

use midir::MidiInput;
use tracing::{debug, trace};

use super::{DeviceBackend, DeviceError, DeviceSet, InputStream, OpenStreams, PortInstances};
use crate::midi::{format_hex, DeviceMessage};

/// Device backend over the system MIDI API
pub struct MidirBackend {
    client_name: String,
    streams: OpenStreams,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            streams: OpenStreams::new(),
        }
    }

    fn midi_input(&self, suffix: &str) -> Result<MidiInput, DeviceError> {
        MidiInput::new(&format!("{}-{}", self.client_name, suffix))
            .map_err(|e| DeviceError::Backend(e.to_string()))
    }
}

impl DeviceBackend for MidirBackend {
    fn list_available_device_ids(&self) -> Result<DeviceSet, DeviceError> {
        let midi_in = self.midi_input("scanner")?;

        let mut instances = PortInstances::new();
        for port in midi_in.ports() {
            if let Ok(name) = midi_in.port_name(&port) {
                instances.insert(name, port.id());
            }
        }

        let ended = self.streams.end_stale(&instances);
        if ended > 0 {
            debug!("Ended {} stream(s) on vanished ports", ended);
        }

        trace!("Enumerated {} MIDI input port(s)", instances.len());
        Ok(instances.into_keys().collect())
    }

    fn open_input_stream(&self, id: &str) -> Result<InputStream, DeviceError> {
        let mut midi_in = self.midi_input("input")?;
        midi_in.ignore(midir::Ignore::All);

        // Exact name match: the id came from enumeration
        let port = midi_in
            .ports()
            .into_iter()
            .find(|port| midi_in.port_name(port).map(|name| name == id).unwrap_or(false))
            .ok_or_else(|| DeviceError::NotFound(id.to_string()))?;

        let (tx, rx) = self.streams.open(id, port.id());
        let port_name = id.to_string();

        let connection = midi_in
            .connect(
                &port,
                &format!("{}-{}", self.client_name, id),
                move |_timestamp, data, _| match DeviceMessage::decode(data) {
                    Some(message) => {
                        // The receiver is gone once the listener stopped
                        let _ = tx.send(Ok(message));
                    }
                    None => {
                        debug!("Failed to decode MIDI on {}: {}", port_name, format_hex(data));
                    }
                },
                (),
            )
            .map_err(|e| {
                self.streams.forget(id);
                DeviceError::Open {
                    id: id.to_string(),
                    reason: e.to_string(),
                }
            })?;

        Ok(InputStream::with_connection(rx, connection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_does_not_panic() {
        // No MIDI subsystem on CI is fine; the call must just return
        let backend = MidirBackend::new("midi-snapshot-test");
        let _ = backend.list_available_device_ids();
    }

    #[test]
    fn test_open_unknown_port() {
        let backend = MidirBackend::new("midi-snapshot-test");
        if let Ok(stream) = backend.open_input_stream("no such port \u{1F50C}") {
            drop(stream);
            panic!("opened a port that does not exist");
        }
    }
}
