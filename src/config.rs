// =============================================================================
// Configuration — Typed, validated engine settings with atomic save
// =============================================================================
//
// Every tunable of the signal engine lives here: the tracked symbols, the
// per-analyzer weights and parameters, the four recommendation thresholds and
// the ambient settings (storage capacity, collector cadence, API bind
// address, log directory).
//
// All fields carry `#[serde(default)]` so that adding new fields never breaks
// loading an older config file.  `validate()` runs at load time so that a
// misordered threshold set or a negative weight is rejected up front instead
// of silently skewing every signal.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BNBUSDT".to_string(),
        "XRPUSDT".to_string(),
        "SOLUSDT".to_string(),
    ]
}

fn default_candle_interval() -> String {
    "1m".to_string()
}

fn default_oi_candle_interval() -> String {
    "1h".to_string()
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_analyzer_timeout_ms() -> u64 {
    10_000
}

fn default_base_url() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_collector_intervals() -> Vec<String> {
    vec!["1m".to_string(), "1h".to_string()]
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_file_prefix() -> String {
    "signal-nexus.log".to_string()
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Per-analyzer parameters
// =============================================================================

/// Price-indicator analyzer (RSI, MACD, Bollinger, Ichimoku, ATR).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalConfig {
    pub weight: f64,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            weight: 0.30,
            rsi_period: 14,
            bb_period: 20,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

impl TechnicalConfig {
    /// Minimum number of candles the analyzer needs.
    pub fn required_candles(&self) -> usize {
        self.macd_slow + self.macd_signal
    }
}

/// Order-book microstructure analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBookConfig {
    pub weight: f64,
    /// Number of levels requested per side by the collector.
    pub depth: usize,
    /// Dead-zone for the imbalance sub-signal, in the same ±100 units.
    pub imbalance_threshold: f64,
}

impl Default for OrderBookConfig {
    fn default() -> Self {
        Self {
            weight: 0.20,
            depth: 20,
            imbalance_threshold: 5.0,
        }
    }
}

/// Funding-rate analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FundingConfig {
    pub weight: f64,
    /// Number of funding observations fetched per analysis.
    pub periods: usize,
    /// Absolute raw rate beyond which funding is treated as extreme.
    pub extreme_threshold: f64,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            weight: 0.15,
            periods: 10,
            extreme_threshold: 0.0005,
        }
    }
}

/// Open-interest analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenInterestConfig {
    pub weight: f64,
    pub lookback: usize,
    /// Percent change below which an OI move is ignored.
    pub change_threshold: f64,
    /// Candle interval used for the price side of the divergence check.
    #[serde(default = "default_oi_candle_interval")]
    pub candle_interval: String,
}

impl Default for OpenInterestConfig {
    fn default() -> Self {
        Self {
            weight: 0.15,
            lookback: 24,
            change_threshold: 1.0,
            candle_interval: default_oi_candle_interval(),
        }
    }
}

/// Volume-delta analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeDeltaConfig {
    pub weight: f64,
    pub lookback: usize,
    /// Volume / average-volume ratio at which a candle counts as an impulse.
    pub significance_threshold: f64,
}

impl Default for VolumeDeltaConfig {
    fn default() -> Self {
        Self {
            weight: 0.20,
            lookback: 12,
            significance_threshold: 2.0,
        }
    }
}

impl VolumeDeltaConfig {
    /// Minimum number of one-minute candles the analyzer needs.
    pub fn required_candles(&self) -> usize {
        self.lookback * 10
    }

    /// Number of candles requested from storage.
    pub fn fetch_limit(&self) -> usize {
        self.lookback * 60
    }
}

/// Composite-score thresholds, evaluated buy side first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    pub strong_buy: f64,
    pub buy: f64,
    pub sell: f64,
    pub strong_sell: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            strong_buy: 50.0,
            buy: 20.0,
            sell: -20.0,
            strong_sell: -50.0,
        }
    }
}

// =============================================================================
// AnalysisConfig
// =============================================================================

/// Everything the signal engine itself consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Seconds between aggregation cycles.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Deadline for a single analyzer invocation.
    #[serde(default = "default_analyzer_timeout_ms")]
    pub analyzer_timeout_ms: u64,

    #[serde(default)]
    pub technical: TechnicalConfig,

    #[serde(default)]
    pub orderbook: OrderBookConfig,

    #[serde(default)]
    pub funding: FundingConfig,

    #[serde(default)]
    pub open_interest: OpenInterestConfig,

    #[serde(default)]
    pub volume_delta: VolumeDeltaConfig,

    #[serde(default)]
    pub signal: SignalThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            analyzer_timeout_ms: default_analyzer_timeout_ms(),
            technical: TechnicalConfig::default(),
            orderbook: OrderBookConfig::default(),
            funding: FundingConfig::default(),
            open_interest: OpenInterestConfig::default(),
            volume_delta: VolumeDeltaConfig::default(),
            signal: SignalThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn analyzer_timeout(&self) -> Duration {
        Duration::from_millis(self.analyzer_timeout_ms)
    }

    /// Reject configurations that would produce meaningless signals.
    pub fn validate(&self) -> Result<()> {
        if self.interval_seconds == 0 {
            bail!("analysis.interval_seconds must be > 0");
        }
        if self.analyzer_timeout_ms == 0 {
            bail!("analysis.analyzer_timeout_ms must be > 0");
        }

        for (name, weight) in [
            ("technical", self.technical.weight),
            ("orderbook", self.orderbook.weight),
            ("funding", self.funding.weight),
            ("open_interest", self.open_interest.weight),
            ("volume_delta", self.volume_delta.weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                bail!("analysis.{name}.weight must be a finite value >= 0, got {weight}");
            }
        }

        let t = &self.technical;
        if t.rsi_period == 0 || t.bb_period == 0 || t.macd_fast == 0 || t.macd_signal == 0 {
            bail!("analysis.technical periods must all be > 0");
        }
        if t.macd_fast >= t.macd_slow {
            bail!(
                "analysis.technical.macd_fast ({}) must be below macd_slow ({})",
                t.macd_fast,
                t.macd_slow
            );
        }

        if !(self.orderbook.imbalance_threshold >= 0.0) {
            bail!("analysis.orderbook.imbalance_threshold must be >= 0");
        }
        if self.funding.periods == 0 {
            bail!("analysis.funding.periods must be > 0");
        }
        if !(self.funding.extreme_threshold >= 0.0) {
            bail!("analysis.funding.extreme_threshold must be >= 0");
        }
        if self.open_interest.lookback < 2 {
            bail!("analysis.open_interest.lookback must be >= 2");
        }
        if !(self.open_interest.change_threshold > 0.0) {
            bail!("analysis.open_interest.change_threshold must be > 0");
        }
        if self.volume_delta.lookback == 0 {
            bail!("analysis.volume_delta.lookback must be > 0");
        }
        if !(self.volume_delta.significance_threshold > 0.0) {
            bail!("analysis.volume_delta.significance_threshold must be > 0");
        }

        let s = &self.signal;
        let ordered = s.strong_buy >= s.buy && s.buy > s.sell && s.sell >= s.strong_sell;
        if !ordered {
            bail!(
                "analysis.signal thresholds must satisfy strong_buy >= buy > sell >= strong_sell \
                 (got {} / {} / {} / {})",
                s.strong_buy,
                s.buy,
                s.sell,
                s.strong_sell
            );
        }

        Ok(())
    }
}

// =============================================================================
// Ambient sections
// =============================================================================

/// Retention limits of the in-memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Candles kept per (symbol, interval).
    pub candle_capacity: usize,
    /// Funding / open-interest observations kept per symbol.
    pub series_capacity: usize,
    /// Signals kept per symbol.
    pub signal_history_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            candle_capacity: 1_000,
            series_capacity: 500,
            signal_history_capacity: 1_000,
        }
    }
}

/// Market-data polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_collector_intervals")]
    pub candle_intervals: Vec<String>,
    #[serde(default)]
    pub candle_refresh_secs: u64,
    #[serde(default)]
    pub order_book_refresh_secs: u64,
    #[serde(default)]
    pub funding_refresh_secs: u64,
    #[serde(default)]
    pub open_interest_refresh_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            candle_intervals: default_collector_intervals(),
            candle_refresh_secs: 15,
            order_book_refresh_secs: 5,
            funding_refresh_secs: 3_600,
            open_interest_refresh_secs: 900,
        }
    }
}

impl CollectorConfig {
    /// Refresh period for a feed, falling back to one minute when unset.
    pub fn period(secs: u64) -> Duration {
        Duration::from_secs(if secs == 0 { 60 } else { secs })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            file_prefix: default_file_prefix(),
        }
    }
}

// =============================================================================
// AppConfig
// =============================================================================

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Symbols the engine tracks.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Interval used by the technical analyzer and for the reference price.
    #[serde(default = "default_candle_interval")]
    pub candle_interval: String,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            candle_interval: default_candle_interval(),
            analysis: AnalysisConfig::default(),
            storage: StorageConfig::default(),
            collector: CollectorConfig::default(),
            api: ApiConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a JSON file at `path`.
    ///
    /// A missing file yields `Ok(None)`.  Only `NotFound` is tolerated;
    /// unreadable, unparsable or invalid files are errors.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read config from {}", path.display()))
            }
        };

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("invalid config in {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            interval_seconds = config.analysis.interval_seconds,
            "config loaded"
        );

        Ok(Some(config))
    }

    /// Persist the configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "config saved (atomic)");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            bail!("at least one symbol must be configured");
        }
        if self.candle_interval.trim().is_empty() {
            bail!("candle_interval must not be empty");
        }
        self.analysis.validate()
    }

    /// Apply `SIGNAL_SYMBOLS` / `SIGNAL_BIND_ADDR` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(syms) = std::env::var("SIGNAL_SYMBOLS") {
            let parsed: Vec<String> = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.symbols = parsed;
            }
        }
        if let Ok(addr) = std::env::var("SIGNAL_BIND_ADDR") {
            if !addr.trim().is_empty() {
                self.api.bind_addr = addr.trim().to_string();
            }
        }
    }
}
