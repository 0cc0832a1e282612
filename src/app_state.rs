// =============================================================================
// Shared Application State
// =============================================================================
//
// Handed to the HTTP layer as `Arc<AppState>`.  The engine owns the signal
// views; the store is exposed for data-availability reporting on /health.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::signals::SignalEngine;
use crate::storage::InMemoryStore;

pub struct AppState {
    pub engine: Arc<SignalEngine>,
    pub store: Arc<InMemoryStore>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: Arc<SignalEngine>, store: Arc<InMemoryStore>) -> Self {
        Self {
            engine,
            store,
            started_at: Utc::now(),
        }
    }

    /// Seconds since the process built its state.
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }

    /// Candles held per tracked symbol on the engine's interval.
    pub fn candle_counts(&self) -> Vec<(String, usize)> {
        let interval = self.engine.candle_interval();
        self.engine
            .symbols()
            .iter()
            .map(|s| (s.clone(), self.store.candle_count(s, interval)))
            .collect()
    }

    /// Whether `symbol` is one the engine tracks.
    pub fn is_tracked(&self, symbol: &str) -> bool {
        self.engine.symbols().iter().any(|s| s == symbol)
    }
}
