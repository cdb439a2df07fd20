//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sessiond::config::{DaemonConfig, ListenerConfig};
use sessiond::net::Acceptor;
use tokio::io::DuplexStream;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

pub const WAIT: Duration = Duration::from_secs(5);

/// Await `fut`, failing the test if it takes longer than `WAIT`.
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut)
        .await
        .expect("timed out waiting")
}

pub fn listener_config(address: &str) -> ListenerConfig {
    ListenerConfig {
        address: address.to_string(),
        ..ListenerConfig::default()
    }
}

pub fn daemon_config(listener: ListenerConfig) -> Arc<DaemonConfig> {
    Arc::new(DaemonConfig {
        listener,
        ..DaemonConfig::default()
    })
}

/// One captured log event.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .push((field.name().to_string(), format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}

/// Layer recording every event it sees.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn at(&self, level: Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.message == message)
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Install a capturing subscriber for the current thread.
///
/// Tests using this must run on the current-thread runtime so spawned
/// tasks log through the same default subscriber.
pub fn capture_logs() -> (LogCapture, tracing::subscriber::DefaultGuard) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}

type Scripted = io::Result<(DuplexStream, SocketAddr)>;

/// In-memory acceptor replaying a fixed script of accept results.
///
/// Once the script is exhausted `accept` pends forever, like an idle
/// listener.
pub struct ScriptedAcceptor {
    script: VecDeque<Scripted>,
    accepts: Arc<AtomicUsize>,
}

impl ScriptedAcceptor {
    pub fn new(script: Vec<Scripted>) -> (Self, Arc<AtomicUsize>) {
        let accepts = Arc::new(AtomicUsize::new(0));
        let acceptor = Self {
            script: script.into(),
            accepts: Arc::clone(&accepts),
        };
        (acceptor, accepts)
    }
}

impl Acceptor for ScriptedAcceptor {
    type Stream = DuplexStream;

    fn accept(&mut self) -> impl Future<Output = Scripted> + Send {
        self.accepts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.pop_front();
        async move {
            match next {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok("127.0.0.1:7000".parse().unwrap())
    }
}

/// A connected in-memory stream pair; the server half goes into the script.
pub fn scripted_connection(port: u16) -> (Scripted, DuplexStream) {
    let (server, client) = tokio::io::duplex(256);
    let peer: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    (Ok((server, peer)), client)
}
