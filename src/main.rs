//! ==============================================================================
//! main.rs - telemetry hub entry point
//! ==============================================================================
//!
//! purpose:
//!     the hub that field sensor nodes (esp32 boards) push readings to.
//!     it keeps a bounded in-memory history, tracks each sensor's last-known
//!     state and streams every new reading to connected dashboards over sse.
//!
//! responsibilities:
//!     - load configuration (hub.toml, .env, PORT)
//!     - set up logging
//!     - build the hub (single owner of all pipeline state)
//!     - serve the rest + sse api
//!
//! relationships:
//!     - uses: config.rs (settings), hub.rs (pipeline), http.rs (routes)
//!
//! architecture:
//!
//!     ┌──────────────┐  POST /api/sensors/data   ┌──────────────────────────────┐
//!     │ sensor nodes │ ────────────────────────> │ hub (one lock)               │
//!     └──────────────┘                           │  ingest -> history (fifo)    │
//!                                                │         -> registry (latest) │
//!     ┌──────────────┐  GET /api/sensors/stream  │         -> broadcaster       │
//!     │ dashboards   │ <──────────────────────── │                              │
//!     └──────────────┘   initial, update, ...    └──────────────┬───────────────┘
//!                                                               │ read-only
//!     ┌──────────────┐  GET /api/sensors/...                    │
//!     │ pollers      │ <─────────────────────── query / health ─┘
//!     └──────────────┘
//!
//! everything lives in memory and is gone on restart.
//!
//! ==============================================================================

mod broadcast;
mod config;
mod domain;
mod error;
mod health;
mod history;
mod http;
mod hub;
mod ingest;
mod query;
mod registry;

use anyhow::{Context, Result};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: environment and configuration
    dotenvy::dotenv().ok();
    let (config, origin) = config::HubConfig::load_or_default();

    // step 2: logging (RUST_LOG wins over the configured level)
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("===========================================================");
    tracing::info!("  Telemetry Hub - in-memory streaming");
    tracing::info!("===========================================================");
    origin.log();
    config.print_summary();

    // step 3: the pipeline
    let hub = hub::Hub::new(&config);
    let state = http::AppState::new(hub, Duration::from_secs(config.streaming.keep_alive_seconds.max(1)));

    // step 4: web server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("[STARTUP] ✓ Ingest:  POST http://{}/api/sensors/data", addr);
    tracing::info!("[STARTUP] ✓ Stream:  GET  http://{}/api/sensors/stream (SSE)", addr);
    tracing::info!("[STARTUP] ✓ Health:  GET  http://{}/api/health", addr);

    axum::serve(listener, http::build_router(state))
        .await
        .context("web server error")?;
    Ok(())
}
