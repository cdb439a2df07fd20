//! TCP listener and accept loop.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming connections and wrap each in a `Session`
//! - Dispatch every session onto its own task without waiting for it
//! - Apply the configured accept error policy and optional admission limit
//! - Stop accepting when shutdown is signalled

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{AcceptErrorPolicy, DaemonConfig, ListenerConfig};
use crate::lifecycle::ShutdownSignal;
use crate::net::handler::{HandlerContext, SessionHandler};
use crate::net::session::{Session, SessionTracker};
use crate::observability::metrics;

/// Error type for listener setup.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// Why the accept loop returned.
#[derive(Debug)]
pub enum AcceptOutcome {
    /// Shutdown was signalled.
    Shutdown,
    /// `accept` failed and the policy did not allow a retry.
    Failed(io::Error),
}

/// Source of inbound connections.
pub trait Acceptor: Send + 'static {
    type Stream: Send + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Errors worth retrying under `AcceptErrorPolicy::RetryTransient`:
/// a connection that died in the backlog, an interrupted call, or
/// momentary resource exhaustion.
pub fn is_transient_accept_error(err: &io::Error) -> bool {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::TimedOut
        | io::ErrorKind::OutOfMemory => true,
        _ => err.raw_os_error().is_some_and(is_resource_exhaustion),
    }
}

#[cfg(unix)]
fn is_resource_exhaustion(code: i32) -> bool {
    matches!(code, libc::ENFILE | libc::EMFILE | libc::ENOBUFS)
}

#[cfg(not(unix))]
fn is_resource_exhaustion(_code: i32) -> bool {
    false
}

fn bind_failed(address: &str, source: io::Error) -> ListenerError {
    tracing::warn!(address = %address, error = %source, "Listener bind failed");
    ListenerError::Bind {
        address: address.to_string(),
        source,
    }
}

/// A bound listener plus its accept policy.
///
/// Admission is unbounded unless `max_sessions` is configured, in which case
/// a semaphore permit is taken before each accept and held by the session.
pub struct Listener<A> {
    inner: A,
    local_addr: SocketAddr,
    session_limit: Option<Arc<Semaphore>>,
    accept_errors: AcceptErrorPolicy,
    retry_delay: Duration,
    tracker: SessionTracker,
}

impl Listener<TcpListener> {
    /// Bind a TCP listener on the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(config.address.as_str())
            .await
            .map_err(|e| bind_failed(&config.address, e))?;
        Self::from_acceptor(listener, config)
    }
}

impl<A: Acceptor> Listener<A> {
    /// Wrap an already bound acceptor.
    pub fn from_acceptor(inner: A, config: &ListenerConfig) -> Result<Self, ListenerError> {
        let local_addr = inner
            .local_addr()
            .map_err(|e| bind_failed(&config.address, e))?;

        tracing::info!(
            address = %local_addr,
            max_sessions = ?config.max_sessions,
            accept_errors = ?config.accept_errors,
            "Listener bound"
        );

        Ok(Self {
            inner,
            local_addr,
            session_limit: config.max_sessions.map(|n| Arc::new(Semaphore::new(n))),
            accept_errors: config.accept_errors,
            retry_delay: config.accept_retry_delay(),
            tracker: SessionTracker::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Tracker counting sessions dispatched by this listener.
    pub fn tracker(&self) -> SessionTracker {
        self.tracker.clone()
    }

    /// Free admission slots, if a limit is configured.
    pub fn available_permits(&self) -> Option<usize> {
        self.session_limit.as_ref().map(|s| s.available_permits())
    }

    /// Run the accept loop until shutdown or an accept failure.
    ///
    /// Sessions are created and dispatched in accept order. The loop never
    /// waits on a dispatched handler.
    pub async fn run<H>(
        mut self,
        handler: H,
        config: Arc<DaemonConfig>,
        shutdown: ShutdownSignal,
    ) -> AcceptOutcome
    where
        H: SessionHandler<A::Stream>,
    {
        let handler = Arc::new(handler);
        let address = self.local_addr;
        let mut stop = shutdown.clone();

        loop {
            let accepted = tokio::select! {
                biased;
                _ = stop.recv() => {
                    tracing::info!(address = %address, "Shutdown requested, accept loop stopping");
                    return AcceptOutcome::Shutdown;
                }
                accepted = self.next_connection() => accepted,
            };

            match accepted {
                Ok((stream, peer_addr, permit)) => {
                    let session = Session::admitted(stream, peer_addr, &self.tracker, permit);
                    tracing::debug!(session = %session.id(), peer = %peer_addr, "Connection accepted");

                    let ctx = HandlerContext::new(Arc::clone(&config), shutdown.clone());
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        handler.handle(session, ctx).await;
                    });
                }
                Err(e) if self.should_retry(&e) => {
                    tracing::warn!(
                        error = %e,
                        retry_in_ms = self.retry_delay.as_millis() as u64,
                        "Transient accept error, retrying"
                    );
                    metrics::accept_error("retry");
                    tokio::select! {
                        biased;
                        _ = stop.recv() => return AcceptOutcome::Shutdown,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed, stopping accept loop");
                    metrics::accept_error("stop");
                    return AcceptOutcome::Failed(e);
                }
            }
        }
    }

    fn should_retry(&self, err: &io::Error) -> bool {
        match self.accept_errors {
            AcceptErrorPolicy::Stop => false,
            AcceptErrorPolicy::RetryTransient => is_transient_accept_error(err),
        }
    }

    /// Take an admission slot (if limited), then accept.
    async fn next_connection(
        &mut self,
    ) -> io::Result<(A::Stream, SocketAddr, Option<OwnedSemaphorePermit>)> {
        let permit = match &self.session_limit {
            Some(limit) => Some(
                Arc::clone(limit)
                    .acquire_owned()
                    .await
                    .map_err(|_| io::Error::other("session limit closed"))?,
            ),
            None => None,
        };
        let (stream, peer_addr) = self.inner.accept().await?;
        Ok((stream, peer_addr, permit))
    }
}
