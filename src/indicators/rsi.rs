// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// 1. Deltas of consecutive closes (oldest first).
// 2. Seed average gain / loss with the SMA of the first `period` deltas.
// 3. avg = (prev_avg * (period - 1) + current) / period
// 4. RSI = 100 - 100 / (1 + avg_gain / avg_loss)
// =============================================================================

/// Latest RSI value for `closes` (oldest first).
///
/// `None` when `period` is zero, there are fewer than `period + 1` closes, or
/// the computation turns non-finite.  A flat series yields 50 and a series
/// with no down moves yields 100.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let split = |d: f64| if d > 0.0 { (d, 0.0) } else { (0.0, -d) };
    let mut deltas = closes.windows(2).map(|w| split(w[1] - w[0]));

    let p = period as f64;
    let (mut avg_gain, mut avg_loss) = deltas
        .by_ref()
        .take(period)
        .fold((0.0, 0.0), |(g, l), (dg, dl)| (g + dg, l + dl));
    avg_gain /= p;
    avg_loss /= p;

    for (gain, loss) in deltas {
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
    }

    let rsi = match (avg_gain == 0.0, avg_loss == 0.0) {
        (true, true) => 50.0,
        (_, true) => 100.0,
        _ => 100.0 - 100.0 / (1.0 + avg_gain / avg_loss),
    };

    rsi.is_finite().then_some(rsi)
}
