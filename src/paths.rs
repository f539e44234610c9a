//! Application path management
//!
//! Resolves where the configuration file and the rotating log live.
//!
//! ## Detection order
//!
//! 1. **Override**: `MIDI_SNAPSHOT_DATA_DIR` names the data directory.
//! 2. **Dev mode** (debug builds only): if `midi_snapshot_plugin.yml` exists in
//!    the current working directory, that directory is used.
//! 3. **Installed** (default): the platform data directory, e.g.
//!    `~/.local/share/midi-snapshot` on Linux.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Directory name under the platform data directory
const APP_NAME: &str = "midi-snapshot";

/// Configuration file name
pub const CONFIG_FILE: &str = "midi_snapshot_plugin.yml";

/// Rotating log file name prefix
pub const LOG_FILE: &str = "midi_snapshot_plugin.log";

/// Rotated log files kept on disk, today's included
pub const MAX_LOG_FILES: usize = 3;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "MIDI_SNAPSHOT_DATA_DIR";

/// Application paths for config and logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
}

impl AppPaths {
    /// Paths rooted at `data_dir`
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            config: data_dir.join(CONFIG_FILE),
            logs_dir: data_dir.join("logs"),
        }
    }

    /// Detect the appropriate paths based on environment.
    ///
    /// Note: This is called before logging is initialized, so we use eprintln
    /// for early diagnostic output.
    pub fn detect() -> Self {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Using {} = {:?}", DATA_DIR_ENV, dir);
            return Self::in_dir(PathBuf::from(dir));
        }

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join(CONFIG_FILE).exists() {
                eprintln!(
                    "[paths] Running in DEV mode ({} found in cwd: {})",
                    CONFIG_FILE,
                    cwd.display()
                );
                return Self::in_dir(cwd);
            }
        }

        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: dirs::data_dir() returned None, falling back to cwd");
                PathBuf::from(".")
            })
            .join(APP_NAME);

        #[cfg(debug_assertions)]
        eprintln!("[paths] Data dir: {}", data_dir.display());

        Self::in_dir(data_dir)
    }

    /// Directory holding the config file
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Create the data and logs directories if missing
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [self.base_dir(), self.logs_dir.clone()] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Daily log file appender in `logs_dir`, pruned to [`MAX_LOG_FILES`]
    pub fn log_appender(&self) -> anyhow::Result<RollingFileAppender> {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE)
            .max_log_files(MAX_LOG_FILES)
            .build(&self.logs_dir)
            .with_context(|| format!("Failed to open log file in {}", self.logs_dir.display()))
    }
}
