// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band = SMA(period), upper/lower = middle ± k·σ (population σ).
//
//   bandwidth = (upper - lower) / middle          (a fraction, not a percent)
//   %B        = (close - lower) / (upper - lower)

#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub bandwidth: f64,
    /// Position of the latest close inside the bands; 0.5 when they collapse.
    pub percent_b: f64,
}

/// Bands over the last `period` closes (oldest first).
///
/// `None` for fewer than `period` closes or a zero middle band.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerBands> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;
    if middle == 0.0 {
        return None;
    }

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;
    let bandwidth = (upper - lower) / middle;

    let close = *closes.last()?;
    let range = upper - lower;
    let percent_b = if range > 0.0 {
        (close - lower) / range
    } else {
        0.5
    };

    (bandwidth.is_finite() && percent_b.is_finite()).then_some(BollingerBands {
        upper,
        middle,
        lower,
        bandwidth,
        percent_b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_bracket_the_mean() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert!(bb.upper > bb.middle && bb.lower < bb.middle);
        assert!(bb.bandwidth > 0.0);
        // Last close (20) sits above the middle (10.5).
        assert!(bb.percent_b > 0.5);
    }

    #[test]
    fn insufficient_data() {
        assert!(calculate_bollinger(&[1.0, 2.0, 3.0], 20, 2.0).is_none());
    }

    #[test]
    fn flat_series_collapses() {
        let bb = calculate_bollinger(&[100.0; 20], 20, 2.0).unwrap();
        assert!(bb.bandwidth.abs() < 1e-12);
        assert!((bb.percent_b - 0.5).abs() < 1e-12);
    }

    #[test]
    fn close_below_lower_band_is_negative_percent_b() {
        let mut closes = vec![100.0, 101.0, 99.0, 100.0, 101.0, 99.0, 100.0, 101.0, 99.0];
        closes.push(80.0);
        let bb = calculate_bollinger(&closes, 10, 2.0).unwrap();
        assert!(80.0 < bb.lower);
        assert!(bb.percent_b < 0.0, "percent_b = {}", bb.percent_b);
    }
}
