// =============================================================================
// Analysis Module — five independent scoring units
// =============================================================================
//
// Each analyzer reads one instrument's data through `MarketDataStore` and
// returns a score in [-100, +100] (positive = bullish).  Analyzers are
// stateless between calls; all their parameters come from `AnalysisConfig`.
//
//   technical      RSI / MACD / Bollinger / Ichimoku / ATR on candles
//   orderbook      imbalance, depth bands, support/resistance, spreads
//   funding        contrarian funding-rate reading
//   openInterest   OI change, OI-vs-price divergence, OI trend
//   volumeDelta    signed volume, impulses, volume/price relation

pub mod funding;
pub mod open_interest;
pub mod orderbook;
pub mod technical;
pub mod volume_delta;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AnalysisConfig;
use crate::error::AnalyzerError;
use crate::storage::MarketDataStore;

pub use funding::FundingAnalyzer;
pub use open_interest::OpenInterestAnalyzer;
pub use orderbook::OrderBookAnalyzer;
pub use technical::TechnicalAnalyzer;
pub use volume_delta::VolumeDeltaAnalyzer;

/// Upper bound of every score; the lower bound is its negation.
pub const SCORE_LIMIT: f64 = 100.0;

/// Which of the five analyzers produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnalyzerKind {
    Technical,
    OrderBook,
    Funding,
    OpenInterest,
    VolumeDelta,
}

impl AnalyzerKind {
    pub const ALL: [AnalyzerKind; 5] = [
        Self::Technical,
        Self::OrderBook,
        Self::Funding,
        Self::OpenInterest,
        Self::VolumeDelta,
    ];

    /// Key used in `SignalResult::components`.
    pub fn component_name(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::OrderBook => "orderbook",
            Self::Funding => "funding",
            Self::OpenInterest => "openInterest",
            Self::VolumeDelta => "volumeDelta",
        }
    }

    /// Composite weight for this analyzer.
    pub fn weight(self, cfg: &AnalysisConfig) -> f64 {
        match self {
            Self::Technical => cfg.technical.weight,
            Self::OrderBook => cfg.orderbook.weight,
            Self::Funding => cfg.funding.weight,
            Self::OpenInterest => cfg.open_interest.weight,
            Self::VolumeDelta => cfg.volume_delta.weight,
        }
    }
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.component_name())
    }
}

/// A single scoring unit.
#[async_trait]
pub trait Analyzer: Send + Sync {
    fn kind(&self) -> AnalyzerKind;

    /// Score `symbol` in [-100, +100].
    async fn analyze(&self, store: &dyn MarketDataStore, symbol: &str) -> Result<f64, AnalyzerError>;
}

/// Build the standard five-analyzer set from configuration.
///
/// `candle_interval` is the interval the technical analyzer reads.
pub fn default_analyzers(cfg: &AnalysisConfig, candle_interval: &str) -> Vec<Arc<dyn Analyzer>> {
    vec![
        Arc::new(TechnicalAnalyzer::new(cfg.technical.clone(), candle_interval)),
        Arc::new(OrderBookAnalyzer::new(cfg.orderbook.clone())),
        Arc::new(FundingAnalyzer::new(cfg.funding.clone())),
        Arc::new(OpenInterestAnalyzer::new(cfg.open_interest.clone())),
        Arc::new(VolumeDeltaAnalyzer::new(cfg.volume_delta.clone())),
    ]
}

/// Clamp a score into [-100, +100]; NaN collapses to 0.
pub(crate) fn clamp_score(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(-SCORE_LIMIT, SCORE_LIMIT)
    }
}

/// `min(|x| * scale, 1)`: the saturating magnitude most sub-signals use.
pub(crate) fn saturate(x: f64, scale: f64) -> f64 {
    (x.abs() * scale).min(1.0)
}

// ── Shared test fixtures ──────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_names_are_stable() {
        let names: Vec<&str> = AnalyzerKind::ALL.iter().map(|k| k.component_name()).collect();
        assert_eq!(
            names,
            vec!["technical", "orderbook", "funding", "openInterest", "volumeDelta"]
        );
    }

    #[test]
    fn weights_come_from_config() {
        let cfg = AnalysisConfig::default();
        let total: f64 = AnalyzerKind::ALL.iter().map(|k| k.weight(&cfg)).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn clamp_handles_nan_and_bounds() {
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(250.0), 100.0);
        assert_eq!(clamp_score(-250.0), -100.0);
        assert_eq!(clamp_score(12.5), 12.5);
    }
}
