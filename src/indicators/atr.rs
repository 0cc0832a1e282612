// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing Method
// =============================================================================
//
//   TR    = max(H - L, |H - prevClose|, |L - prevClose|)
//   ATR_0 = SMA of the first `period` TR values
//   ATR_t = (ATR_{t-1} * (period - 1) + TR_t) / period
// =============================================================================

use crate::types::Candle;

/// Most recent ATR over `candles` (oldest first).
///
/// `None` for a zero period, fewer than `period + 1` candles, or any
/// non-finite intermediate.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let true_ranges: Vec<f64> = candles
        .windows(2)
        .map(|w| {
            let (prev_close, c) = (w[0].close, &w[1]);
            (c.high - c.low)
                .max((c.high - prev_close).abs())
                .max((c.low - prev_close).abs())
        })
        .collect();

    let p = period as f64;
    let mut atr = true_ranges[..period].iter().sum::<f64>() / p;
    if !atr.is_finite() {
        return None;
    }
    for &tr in &true_ranges[period..] {
        atr = (atr * (p - 1.0) + tr) / p;
        if !atr.is_finite() {
            return None;
        }
    }
    Some(atr)
}

/// ATR as a percentage of the latest close.
pub fn calculate_atr_pct(candles: &[Candle], period: usize) -> Option<f64> {
    let atr = calculate_atr(candles, period)?;
    let last_close = candles.last()?.close;
    if last_close == 0.0 {
        return None;
    }
    Some(atr / last_close * 100.0)
}
