//! Lantern signaling hub -- matchmaking for one-to-many peer-to-peer streams.
//!
//! An axum WebSocket server that admits browsers into rooms as the sender or
//! as receivers and relays their connection-negotiation messages. Audio and
//! video flow directly between the browsers, never through the hub.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8080
//! cargo run --bin lantern-hub
//!
//! # Run on custom address and serve the browser client
//! cargo run --bin lantern-hub -- --bind 127.0.0.1:9000 --static-dir ./web
//!
//! # Or via environment variable
//! LANTERN_ADDR=127.0.0.1:9000 cargo run --bin lantern-hub
//! ```

use std::sync::Arc;

use clap::Parser;
use lantern_hub::config::{HubCliArgs, HubConfig};
use lantern_hub::server::{self, ServerState};

#[tokio::main]
async fn main() {
    let cli = HubCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match HubConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        max_rooms = config.max_rooms,
        max_message_size = config.max_message_size,
        "starting lantern hub"
    );

    let state = Arc::new(ServerState::with_config(&config));

    match server::start_server_with_shutdown(&config.bind_addr, state, shutdown_signal()).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, url = %format!("ws://{bound_addr}/ws"), "hub listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "hub server task failed");
            }
            tracing::info!("hub stopped");
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start hub");
            std::process::exit(1);
        }
    }
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
