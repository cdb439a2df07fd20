//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! listener / session / lifecycle produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//! ```
//!
//! # Design Decisions
//! - The subscriber is installed exactly once, after the config is loaded
//! - Events carry key-value fields, never preformatted strings
//! - Metrics are facade calls; the embedder decides on a recorder

pub mod logging;
pub mod metrics;
