// =============================================================================
// Open-Interest Analyzer — participation and OI/price divergence
// =============================================================================
//
// Sub-signal weights:  change 0.4 · divergence 0.4 · trend 0.2
//
// Both series are newest-first.  The divergence check pairs OI reading `i`
// with candle `i` by position; the two feeds are not aligned on timestamps.
// Slopes are computed over the newest-first order, exactly as stored.

use async_trait::async_trait;
use tracing::debug;

use super::{clamp_score, saturate, Analyzer, AnalyzerKind};
use crate::config::OpenInterestConfig;
use crate::error::{parse_decimal, AnalyzerError};
use crate::indicators::regression::linear_slope;
use crate::storage::MarketDataStore;

const W_CHANGE: f64 = 0.4;
const W_DIVERGENCE: f64 = 0.4;
const W_TREND: f64 = 0.2;

/// Points compared in the divergence check.
const DIVERGENCE_WINDOW: usize = 5;
const SLOPE_SCALE: f64 = 1_000.0;

pub struct OpenInterestAnalyzer {
    cfg: OpenInterestConfig,
}

impl OpenInterestAnalyzer {
    pub fn new(cfg: OpenInterestConfig) -> Self {
        Self { cfg }
    }

    fn score(&self, oi: &[f64], closes: &[f64]) -> f64 {
        let change = change_signal(oi, self.cfg.change_threshold);
        let divergence = divergence_signal(oi, closes);
        let trend = trend_signal(oi);

        debug!(change, divergence, trend, "open interest sub-signals");

        clamp_score(change * W_CHANGE + divergence * W_DIVERGENCE + trend * W_TREND)
    }
}

#[async_trait]
impl Analyzer for OpenInterestAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::OpenInterest
    }

    async fn analyze(&self, store: &dyn MarketDataStore, symbol: &str) -> Result<f64, AnalyzerError> {
        let history = store.get_open_interest(symbol, self.cfg.lookback).await?;
        if history.len() < 2 {
            return Err(AnalyzerError::insufficient("open interest readings", 2, history.len()));
        }

        let candles = store
            .get_candles(symbol, &self.cfg.candle_interval, self.cfg.lookback)
            .await?;
        if candles.len() < 2 {
            return Err(AnalyzerError::insufficient("candles", 2, candles.len()));
        }

        let oi = history
            .iter()
            .map(|o| parse_decimal("open interest", &o.value))
            .collect::<Result<Vec<f64>, _>>()?;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        Ok(self.score(&oi, &closes))
    }
}

// ── Sub-signals ───────────────────────────────────────────────────────────

/// Percent change of the two newest readings.  Rising OI (new money) scores
/// up to +50; falling OI (liquidation) down to -20.
pub fn change_signal(oi: &[f64], threshold: f64) -> f64 {
    if oi.len() < 2 || oi[1] == 0.0 || threshold <= 0.0 {
        return 0.0;
    }
    let pct = (oi[0] - oi[1]) / oi[1] * 100.0;
    if pct.abs() < threshold {
        0.0
    } else if pct > 0.0 {
        (pct / threshold).min(1.0) * 50.0
    } else {
        (pct.abs() / threshold).min(1.0) * -20.0
    }
}

/// Index-paired OI/price slopes over the newest few points.
///
/// Opposite directions: price up with OI down is bearish (-70), price down
/// with OI up is bullish (+70).  Same direction: both up +40, both down -40.
/// Fewer than three paired points yields 0.
pub fn divergence_signal(oi: &[f64], closes: &[f64]) -> f64 {
    let n = DIVERGENCE_WINDOW.min(oi.len()).min(closes.len());
    if n < 3 {
        return 0.0;
    }

    let price_slope = linear_slope(&closes[..n]);
    let oi_slope = linear_slope(&oi[..n]);
    let strength = saturate(price_slope * oi_slope, SLOPE_SCALE);

    match (price_slope > 0.0, price_slope < 0.0, oi_slope > 0.0, oi_slope < 0.0) {
        (true, _, _, true) => -70.0 * strength,
        (_, true, true, _) => 70.0 * strength,
        (true, _, true, _) => 40.0 * strength,
        (_, true, _, true) => -40.0 * strength,
        _ => 0.0,
    }
}

/// Needs at least three readings.
pub fn trend_signal(oi: &[f64]) -> f64 {
    if oi.len() < 3 {
        return 0.0;
    }
    let slope = linear_slope(oi);
    if slope > 0.0 {
        30.0 * saturate(slope, SLOPE_SCALE)
    } else {
        -30.0 * saturate(slope, SLOPE_SCALE)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures;
    use crate::storage::InMemoryStore;
    use crate::types::OpenInterest;

    #[test]
    fn change_thresholds() {
        // +2% with a 1% threshold saturates at +50.
        assert_eq!(change_signal(&[102.0, 100.0], 1.0), 50.0);
        // -0.5% sits inside the dead-zone.
        assert_eq!(change_signal(&[99.5, 100.0], 1.0), 0.0);
        // -1.5% saturates at -20.
        assert_eq!(change_signal(&[98.5, 100.0], 1.0), -20.0);
        assert_eq!(change_signal(&[1.0, 0.0], 1.0), 0.0);
    }

    #[test]
    fn price_up_oi_down_is_bearish() {
        // Index slopes: closes rise with index, OI falls with index.
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        let oi = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert_eq!(divergence_signal(&oi, &closes), -70.0);
    }

    #[test]
    fn both_falling_is_bearish() {
        let closes = [5.0, 4.0, 3.0, 2.0, 1.0];
        let oi = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert_eq!(divergence_signal(&oi, &closes), -40.0);
    }

    #[test]
    fn divergence_needs_three_pairs() {
        assert_eq!(divergence_signal(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn trend_is_bounded_to_thirty() {
        assert_eq!(trend_signal(&[10.0, 20.0, 30.0]), 30.0);
        assert_eq!(trend_signal(&[30.0, 20.0, 10.0]), -30.0);
        assert_eq!(trend_signal(&[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn needs_two_readings_each() {
        let store = InMemoryStore::default();
        store.save_open_interest(OpenInterest {
            symbol: "BTCUSDT".into(),
            value: "1000".into(),
            timestamp: 0,
        });
        let analyzer = OpenInterestAnalyzer::new(OpenInterestConfig::default());
        let err = analyzer.analyze(&store, "BTCUSDT").await.unwrap_err();
        assert!(matches!(err, AnalyzerError::InsufficientData { available: 1, .. }));

        store.save_open_interest(OpenInterest {
            symbol: "BTCUSDT".into(),
            value: "1010".into(),
            timestamp: 1,
        });
        let err = analyzer.analyze(&store, "BTCUSDT").await.unwrap_err();
        assert!(matches!(err, AnalyzerError::InsufficientData { what: "candles", .. }));
    }

    #[tokio::test]
    async fn score_is_bounded() {
        let store = InMemoryStore::default();
        for i in 0..24 {
            store.save_open_interest(OpenInterest {
                symbol: "BTCUSDT".into(),
                value: format!("{}", 10_000.0 + i as f64 * 150.0),
                timestamp: i * 3_600_000,
            });
        }
        store.save_candles(fixtures::candles("BTCUSDT", "1h", &fixtures::wave(24, 100.0)));

        let analyzer = OpenInterestAnalyzer::new(OpenInterestConfig::default());
        let score = analyzer.analyze(&store, "BTCUSDT").await.unwrap();
        assert!((-100.0..=100.0).contains(&score));
    }
}
