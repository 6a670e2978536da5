//! Instrumented admin service.
//!
//! ```text
//!                ┌──────────────────────────────────────────────────────┐
//!   request ────▶│ correlation → error boundary → auth → router → handler│
//!                │      │              │          │       │        │    │
//!                │      └──────────────┴──────────┴───────┴────────┘    │
//!                │                       emit                           │
//!                │                        ▼                             │
//!                │   logging service → queue → consumer → store         │
//!                │                                   └──▶ fallback sink │
//!                └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use admin_telemetry::config::{load_or_default, ConfigWatcher};
use admin_telemetry::http::HttpServer;
use admin_telemetry::intercept::ServiceHandle;
use admin_telemetry::lifecycle::{shutdown_signal, Shutdown, TelemetryRuntime};
use admin_telemetry::observability::{init_logging, init_metrics};
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "admin-telemetry")]
#[command(about = "Admin service with request interception and telemetry", long_about = None)]
struct Args {
    /// Path to the TOML configuration file; defaults are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "admin-telemetry starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let runtime = TelemetryRuntime::start(config);

    // Threshold rules follow the config file; everything else needs a restart.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let telemetry = runtime.telemetry().clone();
            tokio::spawn(async move {
                while let Some(updated) = updates.recv().await {
                    let errors = telemetry.configure_thresholds(&updated.thresholds);
                    tracing::info!(
                        rules = updated.thresholds.len(),
                        invalid = errors.len(),
                        "Threshold rules reloaded"
                    );
                }
            });
            match watcher.run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::error!(error = %e, "Config watcher failed to start, hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    let handle = ServiceHandle::new("admin");
    let server = HttpServer::new(runtime.app_state(&handle), Router::new());

    let listener = TcpListener::bind(&bind_address).await?;
    let server_shutdown = Shutdown::new();
    let server_rx = server_shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        server_shutdown.trigger();
    });

    server.run(listener, server_rx).await?;
    runtime.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
