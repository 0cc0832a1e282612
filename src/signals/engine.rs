// =============================================================================
// Signal Engine — per-cycle fan-out over instruments and analyzers
// =============================================================================
//
// One cycle:
//
//   for each symbol (concurrently)
//     for each analyzer (concurrently, each under a deadline)
//       score, or 0 on any analyzer failure
//     combine -> recommendation
//     attach current price, persist, collect
//
// Analyzer failures never drop an instrument.  The only error a cycle can
// return is `EngineError::Cancelled`, observed before each fan-out round; an
// analyzer already running is left to finish.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use super::combiner::combine;
use crate::analysis::{clamp_score, default_analyzers, Analyzer, AnalyzerKind};
use crate::config::AnalysisConfig;
use crate::error::{AnalyzerError, EngineError};
use crate::storage::{MarketDataStore, SignalSink};
use crate::types::SignalResult;

/// Delay before the first scheduled cycle so the collector can backfill.
const DEFAULT_WARMUP: Duration = Duration::from_secs(10);

pub struct SignalEngine {
    cfg: AnalysisConfig,
    symbols: Vec<String>,
    candle_interval: String,
    store: Arc<dyn MarketDataStore>,
    sink: Arc<dyn SignalSink>,
    analyzers: Vec<Arc<dyn Analyzer>>,
    /// Last known signal per symbol, replaced every cycle.
    latest: RwLock<HashMap<String, SignalResult>>,
    warmup: Duration,
    span: Span,
}

impl SignalEngine {
    /// Build an engine running the standard five analyzers.
    pub fn new(
        cfg: AnalysisConfig,
        symbols: Vec<String>,
        candle_interval: impl Into<String>,
        store: Arc<dyn MarketDataStore>,
        sink: Arc<dyn SignalSink>,
        span: Span,
    ) -> Self {
        let candle_interval = candle_interval.into();
        let analyzers = default_analyzers(&cfg, &candle_interval);
        Self {
            cfg,
            symbols,
            candle_interval,
            store,
            sink,
            analyzers,
            latest: RwLock::new(HashMap::new()),
            warmup: DEFAULT_WARMUP,
            span,
        }
    }

    /// Replace the analyzer set.
    pub fn with_analyzers(mut self, analyzers: Vec<Arc<dyn Analyzer>>) -> Self {
        self.analyzers = analyzers;
        self
    }

    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Interval the technical analyzer and the reference price read.
    pub fn candle_interval(&self) -> &str {
        &self.candle_interval
    }

    // ── Read side ──────────────────────────────────────────────────────────

    /// Last known signal for every instrument, ordered by symbol.
    pub fn latest(&self) -> Vec<SignalResult> {
        let mut all: Vec<SignalResult> = self.latest.read().values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    pub fn latest_for(&self, symbol: &str) -> Option<SignalResult> {
        self.latest.read().get(symbol).cloned()
    }

    /// Stored history for `symbol`, newest first.
    pub async fn get_signal_history(&self, symbol: &str, limit: usize) -> Result<Vec<SignalResult>> {
        self.sink.get_signal_history(symbol, limit).await
    }

    // ── Cycle ──────────────────────────────────────────────────────────────

    /// Run one aggregation cycle over every configured symbol.
    pub async fn generate_signals(
        self: &Arc<Self>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, SignalResult>, EngineError> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!(parent: &self.span, "signal_cycle", cycle_id = %cycle_id);

        async {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let results: Arc<Mutex<HashMap<String, SignalResult>>> =
                Arc::new(Mutex::new(HashMap::with_capacity(self.symbols.len())));
            let mut tasks = JoinSet::new();

            for symbol in &self.symbols {
                let engine = Arc::clone(self);
                let results = Arc::clone(&results);
                let cancel = cancel.clone();
                let symbol = symbol.clone();
                tasks.spawn(
                    async move {
                        let signal = engine.signal_for_symbol(&symbol, &cancel).await?;
                        results.lock().insert(symbol, signal);
                        Ok::<(), EngineError>(())
                    }
                    .in_current_span(),
                );
            }

            let mut cancelled = false;
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(EngineError::Cancelled)) => cancelled = true,
                    Err(e) => error!(error = %e, "symbol task failed"),
                }
            }
            if cancelled {
                warn!("signal cycle cancelled");
                return Err(EngineError::Cancelled);
            }

            let snapshot = std::mem::take(&mut *results.lock());
            self.latest
                .write()
                .extend(snapshot.iter().map(|(k, v)| (k.clone(), v.clone())));

            info!(symbols = snapshot.len(), "signal cycle complete");
            Ok(snapshot)
        }
        .instrument(span)
        .await
    }

    /// Score one instrument: analyzer fan-out, neutralise, combine, persist.
    async fn signal_for_symbol(
        &self,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<SignalResult, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let deadline = self.cfg.analyzer_timeout();
        let mut tasks = JoinSet::new();
        for analyzer in &self.analyzers {
            let analyzer = Arc::clone(analyzer);
            let store = Arc::clone(&self.store);
            let symbol = symbol.to_string();
            tasks.spawn(
                async move {
                    let kind = analyzer.kind();
                    let outcome =
                        match tokio::time::timeout(deadline, analyzer.analyze(store.as_ref(), &symbol)).await {
                            Ok(r) => r,
                            Err(_) => Err(AnalyzerError::Timeout(deadline)),
                        };
                    (kind, outcome)
                }
                .in_current_span(),
            );
        }

        let mut scores: BTreeMap<AnalyzerKind, f64> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((kind, Ok(score))) => {
                    debug!(symbol, analyzer = %kind, score, "analyzer finished");
                    scores.insert(kind, clamp_score(score));
                }
                Ok((kind, Err(e))) => {
                    log_neutralised(symbol, kind, &e);
                    scores.insert(kind, 0.0);
                }
                Err(e) => {
                    let e = AnalyzerError::Aborted(e.to_string());
                    warn!(symbol, error_kind = e.kind(), error = %e, "analyzer task lost, using neutral score");
                }
            }
        }

        let combined = combine(&scores, &self.cfg);
        let current_price = self.current_price(symbol).await;

        let signal = SignalResult {
            symbol: symbol.to_string(),
            timestamp: Utc::now(),
            recommendation: combined.recommendation,
            signal_strength: combined.signal_strength,
            position_size: combined.position_size,
            current_price,
            components: combined.components,
        };

        if let Err(e) = self.sink.save_signal(&signal).await {
            warn!(symbol, error = %e, "failed to persist signal");
        }

        info!(
            symbol,
            recommendation = %signal.recommendation,
            strength = format!("{:.2}", signal.signal_strength),
            price = signal.current_price,
            "signal generated"
        );

        Ok(signal)
    }

    /// Close of the newest candle on the engine's interval, or 0 if none.
    async fn current_price(&self, symbol: &str) -> f64 {
        match self.store.get_latest_candles(symbol, &self.candle_interval, 1).await {
            Ok(candles) => candles.first().map_or(0.0, |c| c.close),
            Err(e) => {
                debug!(symbol, error = %e, "no reference price available");
                0.0
            }
        }
    }

    // ── Scheduler ──────────────────────────────────────────────────────────

    /// Drive `generate_signals` on the configured cadence until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let cadence = self.cfg.cadence();
        info!(
            symbols = ?self.symbols,
            cadence_secs = cadence.as_secs(),
            warmup_secs = self.warmup.as_secs(),
            "signal engine started"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("signal engine stopped during warm-up");
                return;
            }
            _ = tokio::time::sleep(self.warmup) => {}
        }

        let mut interval = tokio::time::interval(cadence);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(EngineError::Cancelled) = self.generate_signals(&cancel).await {
                        break;
                    }
                }
            }
        }

        info!("signal engine stopped");
    }
}

fn log_neutralised(symbol: &str, kind: AnalyzerKind, e: &AnalyzerError) {
    match e {
        AnalyzerError::InsufficientData {
            what,
            required,
            available,
        } => warn!(
            symbol,
            analyzer = %kind,
            what,
            required,
            available,
            "insufficient data, using neutral score"
        ),
        _ => warn!(
            symbol,
            analyzer = %kind,
            error_kind = e.kind(),
            error = %e,
            "analyzer failed, using neutral score"
        ),
    }
}
