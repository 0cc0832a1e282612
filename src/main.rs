// =============================================================================
// Signal Nexus — Main Entry Point
// =============================================================================
//
// Collector, signal engine and REST API share one cancellation token.  Ctrl+C
// cancels it, the tasks drain, a default config is seeded if none existed and
// buffered log lines are flushed.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod api;
mod app_state;
mod config;
mod error;
mod exchange;
mod indicators;
mod signals;
mod storage;
mod telemetry;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn};

use crate::app_state::AppState;
use crate::config::AppConfig;
use crate::exchange::MarketDataCollector;
use crate::signals::SignalEngine;
use crate::storage::InMemoryStore;

const DEFAULT_CONFIG_PATH: &str = "signal_config.json";
/// How long spawned tasks get to wind down after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("SIGNAL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    // Only a missing file falls back to defaults; a bad one stops startup.
    let file_config = AppConfig::load(&config_path)?;
    let config_missing = file_config.is_none();
    let mut config = file_config.unwrap_or_default();
    config.apply_env_overrides();

    let telemetry = telemetry::init(&config.telemetry)?;

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Signal Nexus — Starting Up                        ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    if config_missing {
        warn!(path = %config_path, "config file not found, using defaults");
    } else {
        info!(path = %config_path, "config loaded");
    }
    config.validate().context("configuration rejected")?;

    info!(
        symbols = ?config.symbols,
        candle_interval = %config.candle_interval,
        cadence_secs = config.analysis.interval_seconds,
        "configured instruments"
    );

    // ── 2. Store & shared state ──────────────────────────────────────────
    let store = Arc::new(InMemoryStore::new(config.storage.clone()));
    let cancel = CancellationToken::new();

    let engine = Arc::new(SignalEngine::new(
        config.analysis.clone(),
        config.symbols.clone(),
        config.candle_interval.clone(),
        store.clone(),
        store.clone(),
        info_span!("signal_engine"),
    ));
    let state = Arc::new(AppState::new(engine.clone(), store.clone()));

    // ── 3. Market data collector ─────────────────────────────────────────
    let collector = Arc::new(MarketDataCollector::new(&config, store.clone())?);
    let collector_task = tokio::spawn(collector.run(cancel.clone()));

    // ── 4. Signal engine ─────────────────────────────────────────────────
    let engine_task = tokio::spawn(engine.run(cancel.clone()));

    // ── 5. API server ────────────────────────────────────────────────────
    let bind_addr = config.api.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let api_cancel = cancel.clone();
    let api_task = tokio::spawn(async move {
        let app = api::rest::router(state);
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { api_cancel.cancelled().await })
            .await
        {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");
    cancel.cancel();

    let drained = tokio::time::timeout(
        SHUTDOWN_GRACE,
        futures_util::future::join_all([collector_task, engine_task, api_task]),
    )
    .await;
    match drained {
        Ok(results) => {
            for joined in results {
                if let Err(e) = joined {
                    error!(error = %e, "task ended abnormally");
                }
            }
        }
        Err(_) => warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "tasks still running at shutdown"),
    }

    // Seed a template when none existed; an existing file is never rewritten.
    if config_missing {
        match AppConfig::default().save(&config_path) {
            Ok(()) => info!(path = %config_path, "default config written"),
            Err(e) => error!(error = %e, "Failed to write default config on shutdown"),
        }
    }

    info!("Signal Nexus shut down complete.");
    telemetry.shutdown();
    Ok(())
}
