//! Per-connection sessions and their lifetime tracking.
//!
//! # Responsibilities
//! - Wrap an accepted stream into the unit handed to a handler
//! - Assign process-unique session IDs in accept order
//! - Track open sessions so shutdown can drain them
//!
//! A `Session` owns its stream outright; it is moved into exactly one
//! handler task and nothing else keeps a handle to the stream.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, OwnedSemaphorePermit};

use crate::observability::metrics;

/// Global atomic counter for session IDs.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate the next session ID.
    pub fn next() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// One accepted connection.
pub struct Session<S> {
    stream: S,
    guard: SessionGuard,
}

impl<S> Session<S> {
    /// Wrap an accepted stream. Performs no I/O and cannot fail.
    pub fn new(stream: S, peer_addr: SocketAddr) -> Self {
        metrics::session_opened();
        Self {
            stream,
            guard: SessionGuard {
                id: SessionId::next(),
                peer_addr,
                accepted_at: Instant::now(),
                tracker: None,
                _permit: None,
            },
        }
    }

    /// Wrap a stream admitted by the accept loop.
    pub(crate) fn admitted(
        stream: S,
        peer_addr: SocketAddr,
        tracker: &SessionTracker,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        let mut session = Self::new(stream, peer_addr);
        tracker.open();
        session.guard.tracker = Some(tracker.clone());
        session.guard._permit = permit;
        session
    }

    pub fn id(&self) -> SessionId {
        self.guard.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.guard.peer_addr
    }

    pub fn accepted_at(&self) -> Instant {
        self.guard.accepted_at
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Split into the stream and the guard that keeps the session counted.
    ///
    /// The session stays open (tracked, holding its admission slot) until
    /// the guard is dropped.
    pub fn into_parts(self) -> (S, SessionGuard) {
        (self.stream, self.guard)
    }
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.guard.id)
            .field("peer_addr", &self.guard.peer_addr)
            .finish_non_exhaustive()
    }
}

/// Keeps a session accounted for while its stream is in use.
#[derive(Debug)]
pub struct SessionGuard {
    id: SessionId,
    peer_addr: SocketAddr,
    accepted_at: Instant,
    tracker: Option<SessionTracker>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn elapsed(&self) -> Duration {
        self.accepted_at.elapsed()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(tracker) = &self.tracker {
            tracker.close();
        }
        metrics::session_closed();
        tracing::trace!(
            session = %self.id,
            peer = %self.peer_addr,
            duration_ms = self.accepted_at.elapsed().as_millis() as u64,
            "Session closed"
        );
    }
}

/// Counts open sessions so shutdown can wait for them.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    active: Arc<watch::Sender<usize>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { active: Arc::new(tx) }
    }

    fn open(&self) {
        self.active.send_modify(|n| *n += 1);
    }

    fn close(&self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
    }

    pub fn active_count(&self) -> usize {
        *self.active.borrow()
    }

    /// Wait until no tracked session remains open.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn session_ids_increase() {
        let first = Session::new((), peer());
        let second = Session::new((), peer());
        assert!(first.id() < second.id());
    }

    #[test]
    fn ids_render_with_prefix() {
        let first = SessionId::next();
        let second = SessionId::next();
        assert_eq!(first.to_string(), format!("sess-{}", first.as_u64()));
        assert!(second.as_u64() > first.as_u64());
    }

    #[test]
    fn handler_can_use_stream_in_place() {
        let before = Instant::now();
        let mut session = Session::new(Vec::<u8>::new(), peer());
        assert!(session.accepted_at() >= before);
        assert!(session.accepted_at() <= Instant::now());

        session.stream_mut().extend_from_slice(b"hello");
        assert_eq!(session.stream().as_slice(), b"hello");
        assert_eq!(session.peer_addr(), peer());
    }

    #[test]
    fn into_parts_returns_owned_stream() {
        let session = Session::new(vec![1u8, 2, 3], peer());
        let id = session.id();
        let (stream, guard) = session.into_parts();
        assert_eq!(stream, vec![1, 2, 3]);
        assert_eq!(guard.id(), id);
        assert_eq!(guard.peer_addr(), peer());
    }

    #[test]
    fn tracker_counts_admitted_sessions() {
        let tracker = SessionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let first = Session::admitted((), peer(), &tracker, None);
        let second = Session::admitted((), peer(), &tracker, None);
        assert_eq!(tracker.active_count(), 2);

        let (_, guard) = first.into_parts();
        assert_eq!(tracker.active_count(), 2);
        drop(guard);
        assert_eq!(tracker.active_count(), 1);

        drop(second);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn untracked_session_does_not_touch_tracker() {
        let tracker = SessionTracker::new();
        drop(Session::new((), peer()));
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn wait_idle_resolves_after_last_close() {
        let tracker = SessionTracker::new();
        let session = Session::admitted((), peer(), &tracker, None);

        let waiter = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.wait_idle().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(session);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn permit_released_on_drop() {
        let limit = Arc::new(tokio::sync::Semaphore::new(1));
        let permit = limit.clone().acquire_owned().await.unwrap();
        let tracker = SessionTracker::new();

        let session = Session::admitted((), peer(), &tracker, Some(permit));
        assert_eq!(limit.available_permits(), 0);
        drop(session);
        assert_eq!(limit.available_permits(), 1);
    }
}
