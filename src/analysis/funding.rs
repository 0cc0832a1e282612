// =============================================================================
// Funding Analyzer — contrarian read of perpetual funding
// =============================================================================
//
// Positive funding means longs pay shorts: crowded longs, bearish.  Negative
// funding is the mirror image.
//
// Sub-signal weights:  extreme 0.4 · trend 0.4 · change 0.2
//
// The rate history is newest-first and the trend slope is taken over that
// order as-is (index 0 = most recent), so a positive slope means rates were
// higher in the past.

use async_trait::async_trait;
use tracing::debug;

use super::{clamp_score, saturate, Analyzer, AnalyzerKind};
use crate::config::FundingConfig;
use crate::error::{parse_decimal, AnalyzerError};
use crate::indicators::regression::linear_slope;
use crate::storage::MarketDataStore;

const W_EXTREME: f64 = 0.4;
const W_TREND: f64 = 0.4;
const W_CHANGE: f64 = 0.2;

/// A raw rate of 1% saturates the extreme reading.
const EXTREME_SATURATION: f64 = 0.01;
/// A rate move of 0.1% between observations saturates the change reading.
const CHANGE_SATURATION: f64 = 0.001;
/// Multiplier applied to in-band rates (0.01% -> 1 point).
const IN_BAND_SCALE: f64 = 10_000.0;
const SLOPE_SCALE: f64 = 1_000.0;

pub struct FundingAnalyzer {
    cfg: FundingConfig,
}

impl FundingAnalyzer {
    pub fn new(cfg: FundingConfig) -> Self {
        Self { cfg }
    }

    /// Score a newest-first, non-empty rate series.
    fn score(&self, rates: &[f64]) -> f64 {
        let extreme = extreme_signal(rates[0], self.cfg.extreme_threshold);
        let trend = trend_signal(rates);
        let change = change_signal(rates);

        debug!(extreme, trend, change, "funding sub-signals");

        clamp_score(extreme * W_EXTREME + trend * W_TREND + change * W_CHANGE)
    }
}

#[async_trait]
impl Analyzer for FundingAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Funding
    }

    async fn analyze(&self, store: &dyn MarketDataStore, symbol: &str) -> Result<f64, AnalyzerError> {
        let history = store.get_funding_rates(symbol, self.cfg.periods).await?;
        if history.is_empty() {
            return Err(AnalyzerError::insufficient("funding rates", 1, 0));
        }

        let rates = history
            .iter()
            .map(|r| parse_decimal("funding rate", &r.rate))
            .collect::<Result<Vec<f64>, _>>()?;

        Ok(self.score(&rates))
    }
}

// ── Sub-signals ───────────────────────────────────────────────────────────

pub fn extreme_signal(rate: f64, threshold: f64) -> f64 {
    let s = if rate > threshold {
        -100.0 * saturate(rate, 1.0 / EXTREME_SATURATION)
    } else if rate < -threshold {
        100.0 * saturate(rate, 1.0 / EXTREME_SATURATION)
    } else {
        -rate * IN_BAND_SCALE
    };
    clamp_score(s)
}

/// Needs at least three observations.
pub fn trend_signal(rates: &[f64]) -> f64 {
    if rates.len() < 3 {
        return 0.0;
    }
    let slope = linear_slope(rates);
    if slope > 0.0 {
        -100.0 * saturate(slope, SLOPE_SCALE)
    } else {
        100.0 * saturate(slope, SLOPE_SCALE)
    }
}

/// Latest rate minus the previous one; needs at least two observations.
pub fn change_signal(rates: &[f64]) -> f64 {
    if rates.len() < 2 {
        return 0.0;
    }
    let delta = rates[0] - rates[1];
    if delta > 0.0 {
        -100.0 * saturate(delta, 1.0 / CHANGE_SATURATION)
    } else {
        100.0 * saturate(delta, 1.0 / CHANGE_SATURATION)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::types::FundingRate;

    fn seed(store: &InMemoryStore, symbol: &str, oldest_first: &[&str]) {
        for (i, rate) in oldest_first.iter().enumerate() {
            store.save_funding_rate(FundingRate {
                symbol: symbol.into(),
                rate: rate.to_string(),
                timestamp: i as i64 * 28_800_000,
                next_funding_time: (i as i64 + 1) * 28_800_000,
            });
        }
    }

    #[test]
    fn extreme_positive_is_bearish() {
        assert!((extreme_signal(0.001, 0.0005) + 10.0).abs() < 1e-9);
        assert_eq!(extreme_signal(0.05, 0.0005), -100.0);
        assert!((extreme_signal(-0.002, 0.0005) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn in_band_rate_is_scaled() {
        assert!((extreme_signal(0.0001, 0.0005) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn trend_uses_newest_first_order() {
        // Newest-first series that rose over time: slope over index is negative.
        let rising_over_time = [0.0005, 0.0004, 0.0003, 0.0002];
        assert!(trend_signal(&rising_over_time) > 0.0);
        assert_eq!(trend_signal(&[0.0001, 0.0002]), 0.0);
    }

    #[test]
    fn change_saturates() {
        assert_eq!(change_signal(&[0.003, 0.0001]), -100.0);
        assert!((change_signal(&[0.0001, 0.0006]) - 50.0).abs() < 1e-9);
        assert_eq!(change_signal(&[0.0001]), 0.0);
    }

    #[tokio::test]
    async fn empty_history_is_error() {
        let store = InMemoryStore::default();
        let analyzer = FundingAnalyzer::new(FundingConfig::default());
        let err = analyzer.analyze(&store, "BTCUSDT").await.unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
    }

    #[tokio::test]
    async fn malformed_rate_is_parse_error() {
        let store = InMemoryStore::default();
        seed(&store, "BTCUSDT", &["0.0001", "oops"]);
        let analyzer = FundingAnalyzer::new(FundingConfig::default());
        let err = analyzer.analyze(&store, "BTCUSDT").await.unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test]
    async fn crowded_longs_score_negative() {
        let store = InMemoryStore::default();
        seed(&store, "BTCUSDT", &["0.0001", "0.0003", "0.0006", "0.0010", "0.0015"]);
        let analyzer = FundingAnalyzer::new(FundingConfig::default());
        let score = analyzer.analyze(&store, "BTCUSDT").await.unwrap();
        // Extreme and change read bearish; the newest-first slope reads bullish.
        assert!((-100.0..=100.0).contains(&score));
        assert!(score < 0.0, "got {score}");
    }
}
