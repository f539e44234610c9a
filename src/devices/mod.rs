//! Device layer
//!
//! Enumerates MIDI input devices and opens decoded message streams for them.
//! Streams are channel-backed, so a listener can stop waiting on one at any
//! time by dropping it.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::midi::DeviceMessage;

pub mod midir_backend;

pub use midir_backend::MidirBackend;

/// Device identifier: the port name as reported by enumeration
pub type DeviceId = String;

/// Devices visible in one enumeration pass
pub type DeviceSet = BTreeSet<DeviceId>;

/// Device layer errors
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("MIDI backend unavailable: {0}")]
    Backend(String),

    #[error("device '{0}' not found")]
    NotFound(DeviceId),

    #[error("failed to open device '{id}': {reason}")]
    Open { id: DeviceId, reason: String },

    #[error("read error on device '{id}': {reason}")]
    Read { id: DeviceId, reason: String },
}

/// Item yielded by an input stream
pub type StreamItem = Result<DeviceMessage, DeviceError>;

/// Decoded message stream for one device
///
/// The stream ends when the producing side is dropped. Dropping the stream
/// drops the underlying connection, if any.
pub struct InputStream {
    rx: mpsc::UnboundedReceiver<StreamItem>,
    _connection: Option<Box<dyn Any + Send>>,
}

impl InputStream {
    pub fn new(rx: mpsc::UnboundedReceiver<StreamItem>) -> Self {
        Self {
            rx,
            _connection: None,
        }
    }

    /// Stream that keeps `connection` alive for as long as it exists
    pub fn with_connection(
        rx: mpsc::UnboundedReceiver<StreamItem>,
        connection: impl Any + Send,
    ) -> Self {
        Self {
            rx,
            _connection: Some(Box::new(connection)),
        }
    }

    /// Wait for the next message; `None` once the device side closed
    pub async fn recv(&mut self) -> Option<StreamItem> {
        self.rx.recv().await
    }
}

/// Port identity per visible device id, as seen by one enumeration pass
pub type PortInstances = HashMap<DeviceId, String>;

struct TrackedStream {
    instance: String,
    tx: mpsc::UnboundedSender<StreamItem>,
}

/// Streams handed out by a backend, keyed by device id
///
/// A backend whose connection keeps the sending side alive cannot rely on the
/// stream closing when the hardware goes away. It records the port instance
/// at open time and calls [`OpenStreams::end_stale`] on every enumeration, which
/// fails each stream whose port vanished or was replaced by a new one.
#[derive(Default)]
pub struct OpenStreams {
    streams: Mutex<HashMap<DeviceId, TrackedStream>>,
}

impl OpenStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the channel for a stream on `id` and track its sender
    pub fn open(
        &self,
        id: &str,
        instance: impl Into<String>,
    ) -> (mpsc::UnboundedSender<StreamItem>, mpsc::UnboundedReceiver<StreamItem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().insert(
            id.to_string(),
            TrackedStream {
                instance: instance.into(),
                tx: tx.clone(),
            },
        );
        (tx, rx)
    }

    /// Stop tracking `id`, dropping the tracked sender
    pub fn forget(&self, id: &str) {
        self.streams.lock().remove(id);
    }

    /// Fail every stream whose port is not in `present` under the same instance
    ///
    /// Streams whose receiver is gone are forgotten. Returns the number of
    /// streams ended.
    pub fn end_stale(&self, present: &PortInstances) -> usize {
        let mut streams = self.streams.lock();
        streams.retain(|_, stream| !stream.tx.is_closed());

        let stale: Vec<DeviceId> = streams
            .iter()
            .filter(|(id, stream)| present.get(*id) != Some(&stream.instance))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            if let Some(stream) = streams.remove(id) {
                let reason = if present.contains_key(id) {
                    "port was replaced"
                } else {
                    "port disappeared"
                };
                debug!("Ending stream for '{}': {}", id, reason);
                let _ = stream.tx.send(Err(DeviceError::Read {
                    id: id.clone(),
                    reason: reason.to_string(),
                }));
            }
        }
        stale.len()
    }

    /// Number of tracked streams, closed ones included until the next sweep
    pub fn len(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.lock().is_empty()
    }
}

/// Device enumeration and stream opening
pub trait DeviceBackend: Send + Sync {
    /// Currently visible input devices
    ///
    /// Enumeration also ends any open stream whose port is gone or was
    /// replaced, so a quick unplug/replug is seen as a stream error.
    fn list_available_device_ids(&self) -> Result<DeviceSet, DeviceError>;

    /// Open a decoded message stream for `id`
    fn open_input_stream(&self, id: &str) -> Result<InputStream, DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = InputStream::new(rx);

        tx.send(Ok(DeviceMessage::program_change(0, 3))).unwrap();
        drop(tx);

        let first = stream.recv().await.unwrap().unwrap();
        assert_eq!(first, DeviceMessage::program_change(0, 3));
        assert!(stream.recv().await.is_none());
    }

    fn instances(pairs: &[(&str, &str)]) -> PortInstances {
        pairs
            .iter()
            .map(|(id, instance)| (id.to_string(), instance.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_replaced_port_ends_stream() {
        let streams = OpenStreams::new();
        let (_connection_tx, rx) = streams.open("pad", "port-1");
        let mut stream = InputStream::new(rx);

        // Same instance still present: nothing ends
        assert_eq!(streams.end_stale(&instances(&[("pad", "port-1")])), 0);

        // Replugged under the same name with a new port identity
        assert_eq!(streams.end_stale(&instances(&[("pad", "port-2")])), 1);
        assert!(matches!(
            stream.recv().await,
            Some(Err(DeviceError::Read { id, .. })) if id == "pad"
        ));
        assert!(streams.is_empty());
    }

    #[tokio::test]
    async fn test_vanished_port_ends_stream() {
        let streams = OpenStreams::new();
        let (_connection_tx, rx) = streams.open("pad", "port-1");
        let mut stream = InputStream::new(rx);

        assert_eq!(streams.end_stale(&PortInstances::new()), 1);
        assert!(matches!(stream.recv().await, Some(Err(DeviceError::Read { .. }))));
    }

    #[tokio::test]
    async fn test_closed_streams_are_forgotten() {
        let streams = OpenStreams::new();
        let (_tx, rx) = streams.open("pad", "port-1");
        drop(rx);

        assert_eq!(streams.len(), 1);
        assert_eq!(streams.end_stale(&PortInstances::new()), 0);
        assert!(streams.is_empty());
    }

    #[tokio::test]
    async fn test_dropping_stream_closes_channel() {
        let (tx, rx) = mpsc::unbounded_channel::<StreamItem>();
        let stream = InputStream::with_connection(rx, "connection");

        assert!(!tx.is_closed());
        drop(stream);
        assert!(tx.is_closed());
    }
}
