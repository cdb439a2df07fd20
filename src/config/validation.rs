//! Configuration validation.
//!
//! Serde handles the syntactic side; this module checks values. All
//! problems are collected and returned together.

use tracing::level_filters::LevelFilter;

use crate::config::schema::DaemonConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.address must not be empty")]
    EmptyAddress,

    #[error("listener.max_sessions must be greater than zero")]
    ZeroMaxSessions,

    #[error("logger.level `{level}` is invalid: {reason}")]
    InvalidLogLevel { level: String, reason: String },
}

pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.address.trim().is_empty() {
        errors.push(ValidationError::EmptyAddress);
    }

    if config.listener.max_sessions == Some(0) {
        errors.push(ValidationError::ZeroMaxSessions);
    }

    if let Err(e) = config.logger.level.parse::<LevelFilter>() {
        errors.push(ValidationError::InvalidLogLevel {
            level: config.logger.level.clone(),
            reason: e.to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
