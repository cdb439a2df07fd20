//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the process-wide `tracing` subscriber once from `LoggerConfig`
//! - Text format for terminals, JSON for log shippers
//! - Optional append-only log file
//!
//! `RUST_LOG` overrides the configured level when present.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

use crate::config::{LogFormat, LoggerConfig};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter `{directive}`: {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("cannot open log file {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("logger already initialized: {0}")]
    AlreadyInitialized(#[source] TryInitError),
}

/// Build the level filter, preferring `RUST_LOG` over the configured level.
pub fn build_filter(config: &LoggerConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|source| LoggingError::Filter {
        directive: config.level.clone(),
        source,
    })
}

fn build_writer(config: &LoggerConfig) -> Result<BoxMakeWriter, LoggingError> {
    match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File {
                    path: path.clone(),
                    source,
                })?;
            Ok(BoxMakeWriter::new(Mutex::new(file)))
        }
        None => Ok(BoxMakeWriter::new(std::io::stdout)),
    }
}

/// Install the global subscriber.
///
/// Fails instead of panicking if a subscriber is already installed.
pub fn init(config: &LoggerConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;
    let writer = build_writer(config)?;
    let ansi = config.ansi && config.file.is_none();

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
    result.map_err(LoggingError::AlreadyInitialized)?;

    tracing::debug!(
        level = %config.level,
        format = ?config.format,
        file = ?config.file,
        "logger initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_log_directory_is_file_error() {
        let config = LoggerConfig {
            file: Some(PathBuf::from("/nonexistent/dir/sessiond.log")),
            ..LoggerConfig::default()
        };
        let err = build_writer(&config).unwrap_err();
        assert!(matches!(err, LoggingError::File { .. }));
    }

    #[test]
    fn log_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessiond.log");
        let config = LoggerConfig {
            file: Some(path.clone()),
            ..LoggerConfig::default()
        };
        build_writer(&config).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn second_init_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggerConfig {
            file: Some(dir.path().join("sessiond.log")),
            ..LoggerConfig::default()
        };
        // Only this test installs the global subscriber, so the first call may
        // or may not win depending on ordering; the second never does.
        let _ = init(&config);
        let err = init(&config).unwrap_err();
        assert!(matches!(err, LoggingError::AlreadyInitialized(_)));
    }
}
