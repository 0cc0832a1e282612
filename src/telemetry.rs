// =============================================================================
// Telemetry — stdout + rolling file logging
// =============================================================================
//
// Log lines go to stdout (human readable, coloured) and to a daily rolling
// file written by a background worker.  The worker buffers lines, so the
// returned `Telemetry` handle must stay alive until shutdown; dropping it or
// calling `shutdown()` flushes whatever is still queued.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::TelemetryConfig;

/// Owns the file writer's worker guard.
pub struct Telemetry {
    guard: Option<WorkerGuard>,
}

impl Telemetry {
    /// Flush buffered log lines to disk.
    pub fn shutdown(mut self) {
        if let Some(guard) = self.guard.take() {
            drop(guard);
        }
    }
}

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init(cfg: &TelemetryConfig) -> Result<Telemetry> {
    std::fs::create_dir_all(&cfg.log_dir)
        .with_context(|| format!("failed to create log directory {}", cfg.log_dir))?;

    let file_appender = tracing_appender::rolling::daily(&cfg.log_dir, &cfg.file_prefix);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(Telemetry { guard: Some(guard) })
}
