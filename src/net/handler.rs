//! Handler seam between the accept loop and connection work.
//!
//! The accept loop only guarantees delivery: each session arrives on its
//! own task together with the loaded config and a shutdown signal. What is
//! spoken over the stream is up to the handler.

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::DaemonConfig;
use crate::lifecycle::ShutdownSignal;
use crate::net::session::Session;

/// Per-dispatch context handed to every handler invocation.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    config: Arc<DaemonConfig>,
    shutdown: ShutdownSignal,
}

impl HandlerContext {
    pub fn new(config: Arc<DaemonConfig>, shutdown: ShutdownSignal) -> Self {
        Self { config, shutdown }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn shutdown(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }
}

/// Work run for one session on its own task.
pub trait SessionHandler<S>: Send + Sync + 'static {
    fn handle(&self, session: Session<S>, ctx: HandlerContext) -> impl Future<Output = ()> + Send;
}

/// Adapter turning an async closure into a `SessionHandler`.
#[derive(Debug, Clone)]
pub struct FnHandler<F>(F);

pub fn handler_fn<F>(f: F) -> FnHandler<F> {
    FnHandler(f)
}

impl<S, F, Fut> SessionHandler<S> for FnHandler<F>
where
    S: Send + 'static,
    F: Fn(Session<S>, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, session: Session<S>, ctx: HandlerContext) -> impl Future<Output = ()> + Send {
        (self.0)(session, ctx)
    }
}

/// Holds the connection open and discards inbound bytes until the peer
/// closes it, a read fails, or shutdown is signalled.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleHandler;

impl<S> SessionHandler<S> for IdleHandler
where
    S: AsyncRead + Unpin + Send + 'static,
{
    fn handle(&self, session: Session<S>, ctx: HandlerContext) -> impl Future<Output = ()> + Send {
        async move {
            let (mut stream, guard) = session.into_parts();
            let mut shutdown = ctx.shutdown();
            let mut buf = vec![0u8; 4096];
            let mut received = 0u64;

            tracing::debug!(session = %guard.id(), peer = %guard.peer_addr(), "Session opened");

            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        tracing::debug!(session = %guard.id(), "Session closing on shutdown");
                        break;
                    }
                    read = stream.read(&mut buf) => match read {
                        Ok(0) => break,
                        Ok(n) => received += n as u64,
                        Err(e) => {
                            tracing::debug!(session = %guard.id(), error = %e, "Session read failed");
                            break;
                        }
                    },
                }
            }

            tracing::debug!(
                session = %guard.id(),
                bytes = received,
                duration_ms = guard.elapsed().as_millis() as u64,
                "Session finished"
            );
        }
    }
}
