//! MIDI message decoding
//!
//! Decodes raw MIDI bytes into the small set of message kinds the listeners
//! care about. Everything that is not a Control Change or Program Change is
//! reported as [`MessageKind::Other`] so callers can discard it cheaply.

use std::fmt;

/// Decoded message class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Control Change (status 0xB0-0xBF)
    ControlChange,
    /// Program Change (status 0xC0-0xCF)
    ProgramChange,
    /// Any other channel or system message
    Other,
}

/// A decoded device message
///
/// `channel` is the wire channel (0-15). `number` is the controller number for
/// Control Change and the program number for Program Change; it is 0 for
/// [`MessageKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceMessage {
    pub kind: MessageKind,
    pub channel: u8,
    pub number: u8,
}

impl DeviceMessage {
    pub fn control_change(channel: u8, cc: u8) -> Self {
        Self {
            kind: MessageKind::ControlChange,
            channel: channel & 0x0F,
            number: cc & 0x7F,
        }
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        Self {
            kind: MessageKind::ProgramChange,
            channel: channel & 0x0F,
            number: program & 0x7F,
        }
    }

    pub fn other() -> Self {
        Self {
            kind: MessageKind::Other,
            channel: 0,
            number: 0,
        }
    }

    /// Decode a message from raw bytes
    ///
    /// Returns `None` for empty input, running-status data bytes and truncated
    /// CC/PC messages.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;

        // Running status is not tracked
        if status < 0x80 {
            return None;
        }

        if status >= 0xF0 {
            return Some(Self::other());
        }

        let channel = status & 0x0F;
        match status & 0xF0 {
            0xB0 => {
                // Control Change: status, controller, value
                if data.len() < 3 {
                    return None;
                }
                Some(Self::control_change(channel, data[1]))
            }
            0xC0 => {
                // Program Change: status, program
                if data.len() < 2 {
                    return None;
                }
                Some(Self::program_change(channel, data[1]))
            }
            _ => Some(Self::other()),
        }
    }

    /// Channel as written in configuration (1-16)
    pub fn logical_channel(&self) -> u8 {
        self.channel + 1
    }
}

impl fmt::Display for DeviceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MessageKind::ControlChange => {
                write!(f, "CC ch:{} cc:{}", self.logical_channel(), self.number)
            }
            MessageKind::ProgramChange => {
                write!(f, "ProgramChange ch:{} p:{}", self.logical_channel(), self.number)
            }
            MessageKind::Other => write!(f, "Other"),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
