//! Qualigate HTTP server.
//!
//! Binds the validation API and drives scans through the `soda` CLI.
//!
//! # Guarantees
//! - One engine session at a time per process
//! - Connection passwords never appear in logs or error bodies
//! - In-flight scans finish before the process exits on Ctrl-C

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use qualigate_core::{ScanExecutor, SodaCliEngine, init_logging};
use qualigate_server::{AppState, Cli, create_router};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_format.into())?;

    let engine = Arc::new(SodaCliEngine::new(cli.soda_bin.clone()));
    let executor = Arc::new(ScanExecutor::new(engine, cli.executor_config())?);
    let app = create_router(AppState::new(Arc::clone(&executor)));

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!(addr = %cli.bind, soda = %cli.soda_bin.display(), "Qualigate server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    executor.shutdown().await;

    info!("Qualigate server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
