// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   MACD line = EMA(fast) - EMA(slow)
//   Signal    = EMA(signal) of the MACD line
//   Histogram = MACD line - Signal
//
// Every EMA is seeded with the SMA of its first `period` inputs, then
//   EMA_t = x_t * k + EMA_{t-1} * (1 - k),   k = 2 / (period + 1)
//
// Input is oldest-first.
// =============================================================================

/// Latest MACD / signal values plus the full histogram series.
#[derive(Debug, Clone)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: f64,
    /// Histogram values, oldest first; the last element is the current one.
    pub histogram: Vec<f64>,
}

impl MacdResult {
    pub fn last_histogram(&self) -> f64 {
        self.histogram.last().copied().unwrap_or(0.0)
    }

    /// Largest absolute histogram value across the series.
    pub fn max_abs_histogram(&self) -> f64 {
        self.histogram.iter().fold(0.0_f64, |m, h| m.max(h.abs()))
    }
}

/// SMA-seeded EMA series.  Element `i` of the output corresponds to input
/// index `i + period - 1`.  Empty when the input is shorter than `period`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for &x in &values[period..] {
        let next = x * k + prev * (1.0 - k);
        if !next.is_finite() {
            break;
        }
        out.push(next);
        prev = next;
    }
    out
}

/// Compute MACD over `closes` (oldest first).
///
/// Returns `None` when `fast >= slow`, any period is zero, or there are fewer
/// than `slow + signal - 1` closes.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdResult> {
    if fast == 0 || signal == 0 || fast >= slow || closes.len() < slow + signal - 1 {
        return None;
    }

    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    if slow_ema.is_empty() {
        return None;
    }

    // Align both series on the slow EMA's first index (slow - 1).
    let offset = slow - fast;
    let macd_line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .filter_map(|(i, s)| fast_ema.get(i + offset).map(|f| f - s))
        .collect();

    let signal_line = ema(&macd_line, signal);
    if signal_line.is_empty() {
        return None;
    }

    let histogram: Vec<f64> = signal_line
        .iter()
        .enumerate()
        .map(|(j, s)| macd_line[j + signal - 1] - s)
        .collect();

    Some(MacdResult {
        macd: *macd_line.last()?,
        signal: *signal_line.last()?,
        histogram,
    })
}
