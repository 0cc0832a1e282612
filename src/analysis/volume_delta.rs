// =============================================================================
// Volume-Delta Analyzer — signed one-minute volume
// =============================================================================
//
// Sub-signal weights:  cumulative delta 0.5 · impulses 0.3 · volume/price 0.2
//
// Reads one-minute candles, newest-first.  A candle's volume counts as
// selling when it closed below its open and as buying otherwise.

use async_trait::async_trait;
use tracing::debug;

use super::{clamp_score, Analyzer, AnalyzerKind};
use crate::config::VolumeDeltaConfig;
use crate::error::AnalyzerError;
use crate::storage::MarketDataStore;
use crate::types::Candle;

const W_CUMULATIVE: f64 = 0.5;
const W_IMPULSE: f64 = 0.3;
const W_VOLUME_PRICE: f64 = 0.2;

const INTERVAL: &str = "1m";
/// Candles averaged for the impulse baseline.
const IMPULSE_BASELINE: usize = 30;
/// Newest candles inspected for impulses.
const IMPULSE_WINDOW: usize = 10;
/// Relative volume move that counts as significant.
const VOLUME_MOVE: f64 = 0.1;

pub struct VolumeDeltaAnalyzer {
    cfg: VolumeDeltaConfig,
}

impl VolumeDeltaAnalyzer {
    pub fn new(cfg: VolumeDeltaConfig) -> Self {
        Self { cfg }
    }

    fn score(&self, candles: &[Candle]) -> f64 {
        let cumulative = cumulative_delta_signal(candles, self.cfg.lookback);
        let impulses = impulse_signal(candles, self.cfg.significance_threshold);
        let volume_price = volume_price_signal(candles, self.cfg.lookback);

        debug!(cumulative, impulses, volume_price, "volume delta sub-signals");

        clamp_score(cumulative * W_CUMULATIVE + impulses * W_IMPULSE + volume_price * W_VOLUME_PRICE)
    }
}

#[async_trait]
impl Analyzer for VolumeDeltaAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::VolumeDelta
    }

    async fn analyze(&self, store: &dyn MarketDataStore, symbol: &str) -> Result<f64, AnalyzerError> {
        let candles = store
            .get_candles(symbol, INTERVAL, self.cfg.fetch_limit())
            .await?;

        let required = self.cfg.required_candles();
        debug!(
            symbol,
            available = candles.len(),
            required,
            "volume delta input"
        );
        if candles.len() < required {
            return Err(AnalyzerError::insufficient("one-minute candles", required, candles.len()));
        }

        Ok(self.score(&candles))
    }
}

fn signed_volume(c: &Candle) -> f64 {
    if c.is_bearish() {
        -c.volume
    } else {
        c.volume
    }
}

// ── Sub-signals ───────────────────────────────────────────────────────────

/// Linearly decaying weighted delta over the newest `lookback` candles,
/// normalised by the weighted absolute volume.
pub fn cumulative_delta_signal(candles: &[Candle], lookback: usize) -> f64 {
    if lookback == 0 {
        return 0.0;
    }
    let (delta, gross) = candles
        .iter()
        .take(lookback)
        .enumerate()
        .fold((0.0, 0.0), |(d, g), (i, c)| {
            let w = 1.0 - i as f64 / lookback as f64;
            let v = signed_volume(c);
            (d + v * w, g + v.abs() * w)
        });
    if gross == 0.0 {
        0.0
    } else {
        clamp_score(delta / gross * 100.0)
    }
}

/// Volume spikes among the newest candles, each capped at
/// `threshold * 10` points and signed by candle direction.
pub fn impulse_signal(candles: &[Candle], threshold: f64) -> f64 {
    if candles.len() < IMPULSE_BASELINE {
        return 0.0;
    }
    let avg = candles[..IMPULSE_BASELINE].iter().map(|c| c.volume).sum::<f64>()
        / IMPULSE_BASELINE as f64;
    if avg <= 0.0 {
        return 0.0;
    }

    let s: f64 = candles
        .iter()
        .take(IMPULSE_WINDOW)
        .filter_map(|c| {
            let ratio = c.volume / avg;
            if ratio < threshold {
                return None;
            }
            let strength = ((ratio - 1.0) * 10.0).min(threshold * 10.0);
            Some(if c.close > c.open { strength } else { -strength })
        })
        .sum();
    clamp_score(s)
}

/// Adjacent pairs in the lookback window where volume moved more than 10%.
pub fn volume_price_signal(candles: &[Candle], lookback: usize) -> f64 {
    let window = &candles[..lookback.min(candles.len())];
    let s: f64 = window
        .windows(2)
        .filter_map(|w| {
            let (current, previous) = (&w[0], &w[1]);
            if previous.volume == 0.0 || previous.close == 0.0 {
                return None;
            }
            let vol_change = (current.volume - previous.volume) / previous.volume;
            let price_change = (current.close - previous.close) / previous.close;
            if vol_change.abs() <= VOLUME_MOVE {
                return None;
            }
            let up = price_change > 0.0;
            let down = price_change < 0.0;
            let vol_down = vol_change < -VOLUME_MOVE;
            let vol_up = vol_change > VOLUME_MOVE;
            match (up, down, vol_up, vol_down) {
                (true, _, _, true) => Some(-5.0),
                (_, true, _, true) => Some(10.0),
                (true, _, true, _) => Some(10.0),
                (_, true, true, _) => Some(-20.0),
                _ => None,
            }
        })
        .sum();
    clamp_score(s)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures;
    use crate::storage::InMemoryStore;

    /// Newest-first candles from `(open, close, volume)` given newest first.
    fn newest_first(bars: &[(f64, f64, f64)]) -> Vec<Candle> {
        fixtures::candles("BTCUSDT", "1m", bars)
    }

    #[test]
    fn all_buying_is_full_bullish() {
        let candles = newest_first(&[(100.0, 101.0, 10.0); 12]);
        assert!((cumulative_delta_signal(&candles, 12) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn newest_candle_weighs_most() {
        let mut bars = vec![(101.0, 100.0, 10.0); 4];
        bars[0] = (100.0, 101.0, 10.0);
        let candles = newest_first(&bars);
        // weights 1, .75, .5, .25: (1 - 1.5) / 2.5 * 100 = -20
        assert!((cumulative_delta_signal(&candles, 4) + 20.0).abs() < 1e-9);
    }

    #[test]
    fn single_bullish_impulse() {
        let mut bars = vec![(100.0, 100.5, 10.0); 30];
        bars[0] = (100.0, 101.0, 50.0);
        let candles = newest_first(&bars);
        // avg = (50 + 29*10)/30 = 11.333; ratio ≈ 4.41 -> capped at 20.
        assert_eq!(impulse_signal(&candles, 2.0), 20.0);
    }

    #[test]
    fn impulse_needs_baseline() {
        let candles = newest_first(&[(100.0, 101.0, 10.0); 29]);
        assert_eq!(impulse_signal(&candles, 2.0), 0.0);
    }

    #[test]
    fn falling_price_on_rising_volume_is_bearish() {
        // newest: close 99 on volume 20; previous: close 100 on volume 10.
        let candles = newest_first(&[(100.0, 99.0, 20.0), (99.0, 100.0, 10.0)]);
        assert_eq!(volume_price_signal(&candles, 12), -20.0);
    }

    #[test]
    fn zero_volume_pairs_are_skipped() {
        let candles = newest_first(&[(100.0, 99.0, 20.0), (99.0, 100.0, 0.0)]);
        assert_eq!(volume_price_signal(&candles, 12), 0.0);
    }

    #[tokio::test]
    async fn requires_lookback_times_ten() {
        let store = InMemoryStore::default();
        store.save_candles(fixtures::candles("BTCUSDT", "1m", &fixtures::wave(100, 100.0)));
        let analyzer = VolumeDeltaAnalyzer::new(VolumeDeltaConfig::default());
        let err = analyzer.analyze(&store, "BTCUSDT").await.unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::InsufficientData {
                required: 120,
                available: 100,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn score_is_bounded() {
        let store = InMemoryStore::default();
        store.save_candles(fixtures::candles("BTCUSDT", "1m", &fixtures::wave(300, 100.0)));
        let analyzer = VolumeDeltaAnalyzer::new(VolumeDeltaConfig::default());
        let score = analyzer.analyze(&store, "BTCUSDT").await.unwrap();
        assert!((-100.0..=100.0).contains(&score));
    }
}
