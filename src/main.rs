//! sessiond
//!
//! ```text
//! sessiond daemon [-c <config>]
//!     → load config → anchor paths → init logger → bind → accept loop
//!                                                          │
//!                                   one task per session ◀─┘
//! ```
//!
//! Any startup failure prints to stderr and exits with status 1.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use sessiond::lifecycle::{signals, Shutdown, Startup};
use sessiond::net::{AcceptOutcome, IdleHandler};
use sessiond::paths;

#[derive(Parser)]
#[command(name = "sessiond", version)]
#[command(about = "TCP session daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as daemon
    Daemon {
        /// Configuration file [default: <executable dir>/server.toml]
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon { config } => run_daemon(config).await,
    }
}

async fn run_daemon(config: Option<PathBuf>) {
    let base_dir = match paths::base_dir() {
        Ok(dir) => dir,
        Err(e) => fatal(format_args!("cannot determine base directory: {e}")),
    };
    let config_path = config.unwrap_or_else(|| paths::default_config_path(&base_dir));

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    match Startup::new(config_path, base_dir)
        .run(IdleHandler, &shutdown)
        .await
    {
        Ok(AcceptOutcome::Shutdown) => tracing::info!("Shutdown complete"),
        Ok(AcceptOutcome::Failed(e)) => {
            tracing::info!(error = %e, "Accept loop ended, daemon exiting");
        }
        Err(e) => fatal(e),
    }
}

fn fatal(err: impl fmt::Display) -> ! {
    eprintln!("error: {err}");
    std::process::exit(1)
}
