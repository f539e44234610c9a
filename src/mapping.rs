//! Message-to-action mapping
//!
//! Builds the immutable lookup table from the `midi.snapshot` configuration
//! section and parses action strings into typed [`Action`]s.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SnapshotMapConfig;
use crate::midi::{DeviceMessage, MessageKind};

/// Message class a binding applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageClass {
    ControlChange,
    ProgramChange,
}

impl MessageClass {
    /// Map a decoded message kind to a bindable class
    pub fn from_kind(kind: MessageKind) -> Option<Self> {
        match kind {
            MessageKind::ControlChange => Some(MessageClass::ControlChange),
            MessageKind::ProgramChange => Some(MessageClass::ProgramChange),
            MessageKind::Other => None,
        }
    }
}

impl fmt::Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageClass::ControlChange => write!(f, "cc"),
            MessageClass::ProgramChange => write!(f, "pc"),
        }
    }
}

/// Lookup key: class, logical channel (1-16) and controller/program number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MappingKey {
    pub class: MessageClass,
    pub channel: u8,
    pub parameter: u8,
}

/// Navigation action bound to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Next,
    Previous,
    LoadIndex(u32),
}

/// Failure to parse an action string
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionParseError {
    #[error("invalid snapshot index '{index}' in action '{action}'")]
    InvalidIndex { action: String, index: String },

    #[error("unknown action '{0}'")]
    Unknown(String),
}

impl FromStr for Action {
    type Err = ActionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "next" => Ok(Action::Next),
            "previous" => Ok(Action::Previous),
            _ => {
                let index = s
                    .strip_prefix("load:")
                    .ok_or_else(|| ActionParseError::Unknown(s.to_string()))?;
                index
                    .trim()
                    .parse::<u32>()
                    .map(Action::LoadIndex)
                    .map_err(|_| ActionParseError::InvalidIndex {
                        action: s.to_string(),
                        index: index.to_string(),
                    })
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Next => write!(f, "next"),
            Action::Previous => write!(f, "previous"),
            Action::LoadIndex(n) => write!(f, "load:{}", n),
        }
    }
}

/// Immutable binding table
///
/// Action strings are stored raw and parsed on lookup, so a malformed binding
/// only affects the messages that hit it.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    bindings: HashMap<MappingKey, String>,
}

impl MappingTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the table from the `cc`/`pc` sections
    ///
    /// Keys that are not `<1-16>:<0-127>` are skipped with a warning.
    pub fn from_config(config: &SnapshotMapConfig) -> Self {
        let mut bindings = HashMap::new();

        let sections = [
            (MessageClass::ControlChange, &config.cc),
            (MessageClass::ProgramChange, &config.pc),
        ];

        for (class, section) in sections {
            for (key, action) in section {
                match parse_key(key) {
                    Some((channel, parameter)) => {
                        debug!("Binding {} {} -> {}", class, key, action);
                        bindings.insert(
                            MappingKey {
                                class,
                                channel,
                                parameter,
                            },
                            action.clone(),
                        );
                    }
                    None => {
                        warn!(
                            "Ignoring {} binding '{}': expected '<channel 1-16>:<number 0-127>'",
                            class, key
                        );
                    }
                }
            }
        }

        info!("Loaded {} MIDI binding(s)", bindings.len());
        Self { bindings }
    }

    /// Look up the action for a message
    ///
    /// `None` means nothing is bound; an empty action string counts as
    /// unbound. `Some(Err(_))` means a binding exists but its action string is
    /// malformed.
    pub fn lookup(
        &self,
        class: MessageClass,
        channel: u8,
        parameter: u8,
    ) -> Option<Result<Action, ActionParseError>> {
        let key = MappingKey {
            class,
            channel,
            parameter,
        };
        self.bindings
            .get(&key)
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| raw.parse())
    }

    /// Look up a decoded device message, translating its wire channel
    pub fn lookup_message(&self, msg: &DeviceMessage) -> Option<Result<Action, ActionParseError>> {
        let class = MessageClass::from_kind(msg.kind)?;
        self.lookup(class, msg.logical_channel(), msg.number)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings sorted by key, for display
    pub fn entries(&self) -> Vec<(MappingKey, &str)> {
        let mut entries: Vec<_> = self
            .bindings
            .iter()
            .map(|(key, raw)| (*key, raw.as_str()))
            .collect();
        entries.sort_by_key(|(key, _)| *key);
        entries
    }
}

/// Parse `"<channel>:<number>"` with channel in 1-16 and number in 0-127
fn parse_key(key: &str) -> Option<(u8, u8)> {
    let (channel, number) = key.trim().split_once(':')?;
    let channel = channel.trim().parse::<u8>().ok()?;
    let number = number.trim().parse::<u8>().ok()?;

    if !(1..=16).contains(&channel) || number > 127 {
        return None;
    }

    Some((channel, number))
}
