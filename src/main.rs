//! request-warden demo server.
//!
//! Binds an HTTP listener, installs the deadline middleware over a few
//! demonstration routes, and registers the stock logging observer.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────┐
//!                    │                REQUEST WARDEN                  │
//!                    │                                                │
//!   Client Request   │  ┌──────────┐   ┌────────────┐   ┌─────────┐  │
//!   ─────────────────┼─▶│  http    │──▶│  timeline  │──▶│ handler │  │
//!                    │  │middleware│   │ calculator │   │ (routes)│  │
//!                    │  └────┬─────┘   └────────────┘   └────┬────┘  │
//!                    │       │ spawns                        │       │
//!                    │       ▼                               │       │
//!                    │  ┌──────────┐   fires   ┌──────────┐  │       │
//!                    │  │ watchdog │──────────▶│ signal   │──┤       │
//!                    │  │  (task)  │           │ (cancel) │  │       │
//!                    │  └────┬─────┘           └──────────┘  │       │
//!                    │       │ transitions                   │       │
//!                    │       ▼                               ▼       │
//!   Client Response  │  ┌────────────────────┐        ┌──────────┐   │
//!   ◀────────────────┼──│ observer registry  │        │ response │   │
//!                    │  │ (ordered fan-out)  │        │ + req id │   │
//!                    │  └────────────────────┘        └──────────┘   │
//!                    │                                                │
//!                    │  Cross-cutting: config · logging · metrics     │
//!                    └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use request_warden::config::{load_config, WardenConfig};
use request_warden::observability::{logging, metrics};
use request_warden::{LogObserver, ObserverRegistry, WardenServer};

#[derive(Parser)]
#[command(name = "request-warden")]
#[command(about = "Request deadline enforcement demo server", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => WardenConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_tracing(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        timeout_secs = config.deadline.timeout_secs,
        overtime_secs = config.deadline.overtime_secs,
        simple_errors = config.deadline.simple_errors,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let observers = Arc::new(ObserverRegistry::new());
    observers.register("transition-log", Arc::new(LogObserver::new()))?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            ctrl_c.cancel();
        }
    });

    let server = WardenServer::new(&config, observers);
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
