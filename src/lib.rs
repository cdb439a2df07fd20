//! sessiond: TCP session daemon bootstrap.
//!
//! Loads configuration, initializes logging, binds a TCP listener and hands
//! every accepted connection to its own session task.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod paths;

pub use config::DaemonConfig;
pub use lifecycle::{Shutdown, Startup};
pub use net::{AcceptOutcome, Listener, Session, SessionHandler};
