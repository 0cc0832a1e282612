// =============================================================================
// Technical Analyzer — price-indicator composite
// =============================================================================
//
// Sub-signal weights:
//   RSI 0.25 · MACD 0.25 · Bollinger 0.20 · Ichimoku 0.20 · ATR 0.10
//
// Storage hands out candles newest-first; the indicator math runs on the
// reversed (chronological) series.  A sub-indicator that cannot be computed
// from the available history contributes 0.

use async_trait::async_trait;
use tracing::debug;

use super::{clamp_score, Analyzer, AnalyzerKind};
use crate::config::TechnicalConfig;
use crate::error::AnalyzerError;
use crate::indicators::atr::calculate_atr_pct;
use crate::indicators::bollinger::{calculate_bollinger, BollingerBands};
use crate::indicators::ichimoku::{calculate_ichimoku, IchimokuCloud};
use crate::indicators::macd::{calculate_macd, MacdResult};
use crate::indicators::rsi::calculate_rsi;
use crate::storage::MarketDataStore;
use crate::types::Candle;

/// Candles requested per analysis.
const CANDLE_LOOKBACK: usize = 100;
const ATR_PERIOD: usize = 14;
const BB_STD_DEV: f64 = 2.0;

const W_RSI: f64 = 0.25;
const W_MACD: f64 = 0.25;
const W_BOLLINGER: f64 = 0.20;
const W_ICHIMOKU: f64 = 0.20;
const W_ATR: f64 = 0.10;

pub struct TechnicalAnalyzer {
    cfg: TechnicalConfig,
    interval: String,
}

impl TechnicalAnalyzer {
    pub fn new(cfg: TechnicalConfig, interval: impl Into<String>) -> Self {
        Self {
            cfg,
            interval: interval.into(),
        }
    }

    /// Score a chronological (oldest-first) candle series.
    fn score(&self, candles: &[Candle]) -> f64 {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

        let rsi = calculate_rsi(&closes, self.cfg.rsi_period).map_or(0.0, rsi_signal);
        let macd = calculate_macd(
            &closes,
            self.cfg.macd_fast,
            self.cfg.macd_slow,
            self.cfg.macd_signal,
        )
        .map_or(0.0, |m| macd_signal(&m));
        let bollinger =
            calculate_bollinger(&closes, self.cfg.bb_period, BB_STD_DEV).map_or(0.0, |b| bollinger_signal(&b));
        let last_close = closes.last().copied().unwrap_or(0.0);
        let ichimoku = calculate_ichimoku(&highs, &lows).map_or(0.0, |c| ichimoku_signal(last_close, &c));
        let atr = calculate_atr_pct(candles, ATR_PERIOD).map_or(0.0, atr_signal);

        debug!(rsi, macd, bollinger, ichimoku, atr, "technical sub-signals");

        clamp_score(
            rsi * W_RSI + macd * W_MACD + bollinger * W_BOLLINGER + ichimoku * W_ICHIMOKU + atr * W_ATR,
        )
    }
}

#[async_trait]
impl Analyzer for TechnicalAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Technical
    }

    async fn analyze(&self, store: &dyn MarketDataStore, symbol: &str) -> Result<f64, AnalyzerError> {
        let mut candles = store
            .get_candles(symbol, &self.interval, CANDLE_LOOKBACK)
            .await?;

        let required = self.cfg.required_candles();
        if candles.len() < required {
            return Err(AnalyzerError::insufficient("candles", required, candles.len()));
        }

        candles.reverse();
        Ok(self.score(&candles))
    }
}

// ── Sub-signal mappings ───────────────────────────────────────────────────

/// Oversold below 30, overbought above 70, linear in between.
pub fn rsi_signal(rsi: f64) -> f64 {
    let s = if rsi < 30.0 {
        100.0 * (30.0 - rsi) / 30.0
    } else if rsi > 70.0 {
        -100.0 * (rsi - 70.0) / 30.0
    } else {
        (50.0 - rsi) * 2.0
    };
    clamp_score(s)
}

/// Latest histogram normalised by the largest histogram magnitude, signed by
/// the MACD / signal-line cross.
pub fn macd_signal(m: &MacdResult) -> f64 {
    let max = m.max_abs_histogram();
    if max <= 0.0 {
        return 0.0;
    }
    let magnitude = m.last_histogram().abs() / max * 100.0;
    let s = if m.macd > m.signal {
        magnitude
    } else if m.macd < m.signal {
        -magnitude
    } else {
        0.0
    };
    clamp_score(s)
}

pub fn bollinger_signal(b: &BollingerBands) -> f64 {
    let pb = b.percent_b;
    let s = if pb > 1.0 {
        -100.0
    } else if pb < 0.0 {
        100.0
    } else if pb > 0.8 {
        -80.0 * b.bandwidth
    } else if pb < 0.2 {
        80.0 * b.bandwidth
    } else {
        (0.5 - pb) * 100.0 * b.bandwidth
    };
    clamp_score(s)
}

pub fn ichimoku_signal(close: f64, c: &IchimokuCloud) -> f64 {
    if close > c.cloud_top() {
        let mut s = 50.0;
        if c.tenkan > c.kijun {
            s += 30.0;
        }
        if c.senkou_a > c.senkou_b {
            s += 20.0;
        }
        s
    } else if close < c.cloud_bottom() {
        let mut s = -50.0;
        if c.tenkan < c.kijun {
            s -= 30.0;
        }
        if c.senkou_a < c.senkou_b {
            s -= 20.0;
        }
        s
    } else if c.tenkan > c.kijun {
        25.0
    } else if c.tenkan < c.kijun {
        -25.0
    } else {
        0.0
    }
}

/// Contrarian volatility reading; always within [-20, 20].
pub fn atr_signal(atr_pct: f64) -> f64 {
    if atr_pct > 5.0 {
        -20.0
    } else if atr_pct > 3.0 {
        -10.0
    } else if atr_pct < 0.5 {
        20.0
    } else if atr_pct < 1.0 {
        10.0
    } else {
        0.0
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

    #[test]
    fn rsi_mapping() {
        assert!((rsi_signal(20.0) - 33.333_333).abs() < 1e-4);
        assert!((rsi_signal(80.0) + 33.333_333).abs() < 1e-4);
        assert_eq!(rsi_signal(50.0), 0.0);
        assert_eq!(rsi_signal(0.0), 100.0);
        assert_eq!(rsi_signal(100.0), -100.0);
    }

    #[test]
    fn atr_bands_stay_within_twenty() {
        for pct in [0.0, 0.3, 0.7, 1.5, 3.5, 6.0, 50.0] {
            let s = atr_signal(pct);
            assert!((-20.0..=20.0).contains(&s));
        }
        assert_eq!(atr_signal(6.0), -20.0);
        assert_eq!(atr_signal(0.7), 10.0);
        assert_eq!(atr_signal(2.0), 0.0);
    }

    #[test]
    fn bollinger_extremes() {
        let above = BollingerBands {
            upper: 110.0,
            middle: 100.0,
            lower: 90.0,
            bandwidth: 0.2,
            percent_b: 1.2,
        };
        assert_eq!(bollinger_signal(&above), -100.0);

        let near_lower = BollingerBands {
            percent_b: 0.1,
            ..above.clone()
        };
        assert!((bollinger_signal(&near_lower) - 16.0).abs() < 1e-9);
    }

    #[test]
    fn macd_sign_follows_cross() {
        let bullish = MacdResult {
            macd: 2.0,
            signal: 1.0,
            histogram: vec![-2.0, 0.5, 1.0],
        };
        assert!((macd_signal(&bullish) - 50.0).abs() < 1e-9);

        let bearish = MacdResult {
            macd: 1.0,
            signal: 2.0,
            histogram: vec![4.0, -1.0],
        };
        assert!((macd_signal(&bearish) + 25.0).abs() < 1e-9);
    }

    #[test]
    fn ichimoku_above_rising_cloud_is_max() {
        let c = IchimokuCloud {
            tenkan: 105.0,
            kijun: 100.0,
            senkou_a: 98.0,
            senkou_b: 95.0,
        };
        assert_eq!(ichimoku_signal(110.0, &c), 100.0);
        assert_eq!(ichimoku_signal(96.0, &c), 25.0);
        assert_eq!(ichimoku_signal(90.0, &c), -50.0);
    }

    #[tokio::test]
    async fn insufficient_candles_is_error() {
        let store = InMemoryStore::default();
        store.save_candles(fixtures::candles("BTCUSDT", "1m", &fixtures::wave(20, 100.0)));

        let analyzer = TechnicalAnalyzer::new(TechnicalConfig::default(), "1m");
        let err = analyzer.analyze(&store, "BTCUSDT").await.unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::InsufficientData {
                required: 35,
                available: 20,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn score_is_bounded() {
        let store = InMemoryStore::default();
        store.save_candles(fixtures::candles("BTCUSDT", "1m", &fixtures::wave(150, 100.0)));

        let analyzer = TechnicalAnalyzer::new(TechnicalConfig::default(), "1m");
        let score = analyzer.analyze(&store, "BTCUSDT").await.unwrap();
        assert!((-100.0..=100.0).contains(&score));
    }

    #[tokio::test]
    async fn monotonic_rally_stays_bounded() {
        let bars: Vec<(f64, f64, f64)> = (0..100)
            .map(|i| (100.0 + i as f64, 101.0 + i as f64, 100.0))
            .collect();
        let store = InMemoryStore::default();
        store.save_candles(fixtures::candles("ETHUSDT", "1m", &bars));

        let analyzer = TechnicalAnalyzer::new(TechnicalConfig::default(), "1m");
        let score = analyzer.analyze(&store, "ETHUSDT").await.unwrap();
        assert!((-100.0..=100.0).contains(&score));
    }
}
