//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, admission, accept error policy)
//!     → session.rs (Session wraps the stream, exclusive ownership)
//!     → handler.rs (one spawned task per session)
//! ```
//!
//! # Design Decisions
//! - Dispatch never waits on a handler; accept order is dispatch order
//! - Config and shutdown reach handlers through `HandlerContext`
//! - Admission is unbounded unless `max_sessions` is set

pub mod handler;
pub mod listener;
pub mod session;

pub use handler::{handler_fn, FnHandler, HandlerContext, IdleHandler, SessionHandler};
pub use listener::{is_transient_accept_error, AcceptOutcome, Acceptor, Listener, ListenerError};
pub use session::{Session, SessionGuard, SessionId, SessionTracker};
