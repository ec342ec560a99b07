//! Development server command implementation.
//!
//! Orchestrates the server lifecycle:
//! - HTTP listener on the configured port
//! - Reload WebSocket listener on the next port (watch mode only)
//! - Invalidation loop fed by the file watcher
//! - Graceful shutdown on Ctrl+C

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tern_config::ServerConfig;
use tokio::signal;
use tokio::sync::watch;
use tracing::debug;

use crate::dev::{DevServer, DevServerState, run_invalidation, serve_reload};
use crate::error::{CliError, Result};
use crate::ui;

/// Serve `config.root` until Ctrl+C or a listener fails.
pub async fn execute(config: ServerConfig) -> Result<()> {
    let debounce = Duration::from_millis(config.debounce_ms);
    let (state, changes) = DevServerState::with_oxc(config)?;
    let state = Arc::new(state);
    let config = Arc::clone(&state.config);

    let (stop_tx, stop_rx) = watch::channel(false);

    let server = DevServer::new(Arc::clone(&state));
    let mut server_handle = tokio::spawn(server.start(stopped(stop_rx.clone())));

    let mut reload_handle = if config.watch {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.reload_port()));
        ui::info(&format!("Live reload on ws://localhost:{}", config.reload_port()));
        Some(tokio::spawn(serve_reload(
            Arc::clone(&state.reload),
            addr,
            stopped(stop_rx.clone()),
        )))
    } else {
        None
    };

    let invalidation = tokio::spawn(run_invalidation(Arc::clone(&state), changes, debounce));

    ui::info(&format!(
        "Compiling to {}{}",
        config.target,
        if config.watch { ", watching served files" } else { "" }
    ));
    ui::info("Press Ctrl+C to stop");

    let outcome = tokio::select! {
        _ = signal::ctrl_c() => {
            ui::info("Shutting down development server...");
            Ok(())
        }

        result = &mut server_handle => listener_ended("HTTP", result),

        Some(result) = wait_optional(&mut reload_handle) => listener_ended("reload", result),
    };

    let _ = stop_tx.send(true);
    state.reload.close_all();
    invalidation.abort();

    if !server_handle.is_finished() {
        let _ = tokio::time::timeout(Duration::from_secs(5), server_handle).await;
    }
    if let Some(handle) = reload_handle {
        if !handle.is_finished() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }

    if outcome.is_ok() {
        ui::success("Development server stopped");
    }
    outcome
}

/// Resolves once the stop flag flips to `true`.
async fn stopped(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
    debug!("shutdown signal received");
}

async fn wait_optional<T>(
    handle: &mut Option<tokio::task::JoinHandle<T>>,
) -> Option<Result<T, tokio::task::JoinError>> {
    match handle {
        Some(handle) => Some(handle.await),
        None => std::future::pending().await,
    }
}

fn listener_ended(
    name: &str,
    result: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    match result {
        Ok(Ok(())) => Err(CliError::Server(format!("{} listener stopped unexpectedly", name))),
        Ok(Err(e)) => Err(e),
        Err(e) => Err(CliError::Server(format!("{} listener task failed: {}", name, e))),
    }
}
