// =============================================================================
// Ordinary least-squares slope
// =============================================================================

/// Slope of the least-squares line through `(i, values[i])`.
///
/// The x-axis is the position in the slice, so the sign of the slope depends
/// on the order the caller passes the series in.  Fewer than two points, a
/// degenerate denominator or a non-finite result all yield `0.0`.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let nf = n as f64;
    let (sum_x, sum_y, sum_xy, sum_xx) = values.iter().enumerate().fold(
        (0.0, 0.0, 0.0, 0.0),
        |(sx, sy, sxy, sxx), (i, &y)| {
            let x = i as f64;
            (sx + x, sy + y, sxy + x * y, sxx + x * x)
        },
    );

    let denom = nf * sum_xx - sum_x * sum_x;
    if denom == 0.0 {
        return 0.0;
    }

    let slope = (nf * sum_xy - sum_x * sum_y) / denom;
    if slope.is_finite() {
        slope
    } else {
        0.0
    }
}
