//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigError;
use crate::paths;

/// Root configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DaemonConfig {
    /// Listener configuration (address, admission, accept errors).
    pub listener: ListenerConfig,

    /// Logger settings.
    pub logger: LoggerConfig,
}

impl DaemonConfig {
    /// Anchor every relative path in the configuration on `base`.
    ///
    /// `base` must be absolute. When a log file is configured its parent
    /// directory must already exist.
    pub fn format(&mut self, base: &Path) -> Result<(), ConfigError> {
        if !base.is_absolute() {
            return Err(ConfigError::RelativeBase(base.to_path_buf()));
        }

        if let Some(file) = self.logger.file.as_mut() {
            let resolved = paths::anchor(base, file);
            match resolved.parent() {
                Some(dir) if dir.is_dir() => {}
                Some(dir) => return Err(ConfigError::MissingLogDirectory(dir.to_path_buf())),
                None => return Err(ConfigError::MissingLogDirectory(resolved)),
            }
            *file = resolved;
        }

        Ok(())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Listen address (e.g., "0.0.0.0:9000").
    pub address: String,

    /// Maximum concurrently open sessions. Unset means unbounded.
    pub max_sessions: Option<usize>,

    /// What the accept loop does when `accept` fails.
    pub accept_errors: AcceptErrorPolicy,

    /// Delay before retrying after a transient accept error.
    pub accept_retry_delay_ms: u64,

    /// How long to wait for open sessions after a shutdown request.
    pub drain_timeout_secs: u64,
}

impl ListenerConfig {
    pub fn accept_retry_delay(&self) -> Duration {
        Duration::from_millis(self.accept_retry_delay_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:9000".to_string(),
            max_sessions: None,
            accept_errors: AcceptErrorPolicy::Stop,
            accept_retry_delay_ms: 100,
            drain_timeout_secs: 30,
        }
    }
}

/// Accept error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptErrorPolicy {
    /// Any accept error ends the accept loop.
    #[default]
    Stop,
    /// Transient errors are logged and retried; anything else ends the loop.
    RetryTransient,
}

/// Logger settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Log level (trace, debug, info, warn, error, off).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Append log output to this file instead of stdout.
    /// Relative paths are anchored on the base directory.
    pub file: Option<PathBuf>,

    /// Colored output. Ignored when writing to a file.
    pub ansi: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
            ansi: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
