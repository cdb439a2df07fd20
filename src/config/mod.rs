//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → DaemonConfig::format (anchor relative paths on the base directory)
//!     → Arc<DaemonConfig> (immutable, passed to the listener and every handler)
//! ```
//!
//! # Design Decisions
//! - Config is loaded once per process and never mutated afterwards
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AcceptErrorPolicy, DaemonConfig, ListenerConfig, LogFormat, LoggerConfig};
pub use validation::ValidationError;
