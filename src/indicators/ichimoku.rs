// =============================================================================
// Ichimoku Kinko Hyo
// =============================================================================
//
// Each line is the midpoint of the highest high and lowest low over a window:
//
//   Tenkan-sen    9 periods
//   Kijun-sen     26 periods
//   Senkou A      (Tenkan + Kijun) / 2, plotted 26 periods ahead
//   Senkou B      52-period midpoint, plotted 26 periods ahead
//
// The cloud under the current candle is therefore built from values computed
// 26 candles ago.

pub const TENKAN_PERIOD: usize = 9;
pub const KIJUN_PERIOD: usize = 26;
pub const SENKOU_B_PERIOD: usize = 52;
pub const DISPLACEMENT: usize = 26;

/// Lines relevant to the latest candle.
#[derive(Debug, Clone, Copy)]
pub struct IchimokuCloud {
    pub tenkan: f64,
    pub kijun: f64,
    pub senkou_a: f64,
    pub senkou_b: f64,
}

impl IchimokuCloud {
    pub fn cloud_top(&self) -> f64 {
        self.senkou_a.max(self.senkou_b)
    }

    pub fn cloud_bottom(&self) -> f64 {
        self.senkou_a.min(self.senkou_b)
    }
}

/// Midpoint of the `period` highs/lows ending at index `end` (inclusive).
fn midpoint(highs: &[f64], lows: &[f64], end: usize, period: usize) -> Option<f64> {
    if end + 1 < period || end >= highs.len() || end >= lows.len() {
        return None;
    }
    let start = end + 1 - period;
    let hi = highs[start..=end].iter().copied().fold(f64::MIN, f64::max);
    let lo = lows[start..=end].iter().copied().fold(f64::MAX, f64::min);
    Some((hi + lo) / 2.0)
}

/// Ichimoku lines for the latest candle of `highs` / `lows` (oldest first).
///
/// With at least `52 + 26` candles the cloud is the displaced one.  With
/// fewer (but at least 52) the cloud falls back to the undisplaced values at
/// the latest candle.  Below 52 candles there is no Senkou B and the result
/// is `None`.
pub fn calculate_ichimoku(highs: &[f64], lows: &[f64]) -> Option<IchimokuCloud> {
    let len = highs.len().min(lows.len());
    if len < SENKOU_B_PERIOD {
        return None;
    }
    let last = len - 1;

    let tenkan = midpoint(highs, lows, last, TENKAN_PERIOD)?;
    let kijun = midpoint(highs, lows, last, KIJUN_PERIOD)?;

    let cloud_at = if len >= SENKOU_B_PERIOD + DISPLACEMENT {
        last - DISPLACEMENT
    } else {
        last
    };

    let senkou_a = (midpoint(highs, lows, cloud_at, TENKAN_PERIOD)?
        + midpoint(highs, lows, cloud_at, KIJUN_PERIOD)?)
        / 2.0;
    let senkou_b = midpoint(highs, lows, cloud_at, SENKOU_B_PERIOD)?;

    Some(IchimokuCloud {
        tenkan,
        kijun,
        senkou_a,
        senkou_b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_52_candles() {
        let highs = vec![101.0; 51];
        let lows = vec![99.0; 51];
        assert!(calculate_ichimoku(&highs, &lows).is_none());
    }

    #[test]
    fn flat_market_all_lines_equal() {
        let highs = vec![101.0; 100];
        let lows = vec![99.0; 100];
        let c = calculate_ichimoku(&highs, &lows).unwrap();
        for v in [c.tenkan, c.kijun, c.senkou_a, c.senkou_b] {
            assert!((v - 100.0).abs() < 1e-12);
        }
    }

    #[test]
    fn uptrend_price_above_displaced_cloud() {
        let highs: Vec<f64> = (0..100).map(|i| 101.0 + i as f64).collect();
        let lows: Vec<f64> = (0..100).map(|i| 99.0 + i as f64).collect();
        let c = calculate_ichimoku(&highs, &lows).unwrap();
        let last_close = 100.0 + 99.0;
        assert!(last_close > c.cloud_top());
        assert!(c.tenkan > c.kijun);
        assert!(c.senkou_a > c.senkou_b);
    }

    #[test]
    fn short_history_uses_undisplaced_cloud() {
        let highs: Vec<f64> = (0..60).map(|i| 101.0 + i as f64).collect();
        let lows: Vec<f64> = (0..60).map(|i| 99.0 + i as f64).collect();
        let c = calculate_ichimoku(&highs, &lows).unwrap();
        // Senkou B over the last 52 candles: (160 + 107) / 2.
        assert!((c.senkou_b - 133.5).abs() < 1e-12);
    }
}
