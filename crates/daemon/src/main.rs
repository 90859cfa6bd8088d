// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `ksid` — the daemon binary. Resolves configuration from the environment,
//! wires every subsystem together through `DaemonContext`, binds the Unix
//! socket, and runs the accept loop until asked to shut down.

mod bus;
mod config;
mod connection;
mod connections;
mod context;
mod handlers;
mod listener;
mod permissions;
mod registry;
mod router;
mod sandbox;
mod state;
mod supervisor;

use std::sync::Arc;

use tokio::net::{TcpListener, UnixListener};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use context::DaemonContext;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(config::log_filter())).init();

    let config = Config::from_env();
    config.ensure_dirs()?;

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener_socket = UnixListener::bind(&config.socket_path)?;
    info!(socket = %config.socket_path.display(), "listening");

    let tcp_listener = match config.tcp_port {
        Some(port) => {
            let listener = TcpListener::bind(("127.0.0.1", port)).await?;
            if config.auth_token.is_none() {
                warn!(port, "secondary TCP listener enabled with no KSI_AUTH_TOKEN set, accepting unauthenticated local clients");
            } else {
                info!(port, "secondary TCP listener enabled, auth token required");
            }
            Some(listener)
        }
        None => None,
    };

    let ctx = DaemonContext::build(config);
    handlers::register_all(&ctx);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let serve_ctx = ctx.clone();
    let accept_loop = tokio::spawn(async move {
        listener::serve(serve_ctx, listener_socket, tcp_listener).await;
    });

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
        _ = ctx.shutdown.notified() => info!("shutdown requested via system:shutdown"),
    }

    accept_loop.abort();
    ctx.supervisor.drain_all().await;
    ctx.bus.shutdown_drain(ctx.config.drain_timeout).await;

    if let Err(e) = std::fs::remove_file(&ctx.config.socket_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            error!(error = %e, "failed to remove socket on shutdown");
        }
    }

    info!("shutdown complete");
    Ok(())
}
