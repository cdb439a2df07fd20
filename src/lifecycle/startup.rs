//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration, then anchor its relative paths on the base directory
//! - Initialize the logger from the loaded configuration
//! - Bind the listener and run the accept loop
//! - Drain open sessions once the accept loop returns
//!
//! # Design Decisions
//! - Fail fast: every stage error is fatal and is returned to `main`
//! - Stages run strictly in order; each one depends on the previous
//! - The listener starts last (traffic only when ready)

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpStream;

use crate::config::{load_config, ConfigError, DaemonConfig};
use crate::lifecycle::Shutdown;
use crate::net::{AcceptOutcome, Acceptor, Listener, ListenerError, SessionHandler};
use crate::observability::logging::{self, LoggingError};

/// Startup stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    ConfigLoaded,
    PathsResolved,
    LoggerReady,
    Serving,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ConfigLoaded => "config-loaded",
            Stage::PathsResolved => "paths-resolved",
            Stage::LoggerReady => "logger-ready",
            Stage::Serving => "serving",
        };
        f.write_str(name)
    }
}

/// Fatal startup error, one variant per stage.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[source] ConfigError),

    #[error("failed to resolve configuration paths: {0}")]
    Paths(#[source] ConfigError),

    #[error("failed to initialize logger: {0}")]
    Logger(#[source] LoggingError),

    #[error("failed to start listener: {0}")]
    Bind(#[source] ListenerError),
}

impl StartupError {
    /// The stage that could not be reached.
    pub fn stage(&self) -> Stage {
        match self {
            StartupError::Config(_) => Stage::ConfigLoaded,
            StartupError::Paths(_) => Stage::PathsResolved,
            StartupError::Logger(_) => Stage::LoggerReady,
            StartupError::Bind(_) => Stage::Serving,
        }
    }
}

/// The ordered startup sequence for one daemon process.
#[derive(Debug, Clone)]
pub struct Startup {
    config_path: PathBuf,
    base_dir: PathBuf,
}

impl Startup {
    pub fn new(config_path: impl Into<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            base_dir: base_dir.into(),
        }
    }

    /// Load the configuration and anchor its paths.
    ///
    /// Runs before the logger exists, so failures are only reported through
    /// the returned error.
    pub fn prepare(&self) -> Result<DaemonConfig, StartupError> {
        let mut config = load_config(&self.config_path).map_err(StartupError::Config)?;
        config.format(&self.base_dir).map_err(StartupError::Paths)?;
        Ok(config)
    }

    /// Run every stage, then serve until shutdown or an accept failure.
    ///
    /// Returns once [`serve`] has drained the dispatched sessions.
    pub async fn run<H>(self, handler: H, shutdown: &Shutdown) -> Result<AcceptOutcome, StartupError>
    where
        H: SessionHandler<TcpStream>,
    {
        let config = self.prepare()?;

        logging::init(&config.logger).map_err(StartupError::Logger)?;
        tracing::info!(
            stage = %Stage::LoggerReady,
            config = %self.config_path.display(),
            base_dir = %self.base_dir.display(),
            "sessiond v{} starting",
            env!("CARGO_PKG_VERSION")
        );

        let config = Arc::new(config);
        let listener = Listener::bind(&config.listener)
            .await
            .map_err(StartupError::Bind)?;
        tracing::info!(stage = %Stage::Serving, "Serving");

        Ok(serve(listener, handler, config, shutdown).await)
    }
}

/// Run the accept loop, then wait for the sessions it dispatched.
///
/// After a shutdown request the wait is bounded by
/// `listener.drain_timeout_secs`; after an accept failure open sessions run
/// to completion.
pub async fn serve<A, H>(
    listener: Listener<A>,
    handler: H,
    config: Arc<DaemonConfig>,
    shutdown: &Shutdown,
) -> AcceptOutcome
where
    A: Acceptor,
    H: SessionHandler<A::Stream>,
{
    let tracker = listener.tracker();
    let outcome = listener
        .run(handler, Arc::clone(&config), shutdown.subscribe())
        .await;

    let open = tracker.active_count();
    match &outcome {
        AcceptOutcome::Shutdown => {
            tracing::info!(open_sessions = open, "Draining sessions");
            let drain = config.listener.drain_timeout();
            if tokio::time::timeout(drain, tracker.wait_idle()).await.is_err() {
                tracing::warn!(
                    open_sessions = tracker.active_count(),
                    timeout_secs = drain.as_secs(),
                    "Drain timed out, abandoning open sessions"
                );
            }
        }
        AcceptOutcome::Failed(_) => {
            tracing::info!(open_sessions = open, "No longer accepting, waiting for open sessions");
            tracker.wait_idle().await;
        }
    }

    outcome
}
