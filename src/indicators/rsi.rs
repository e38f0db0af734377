/// Relative Strength Index (RSI) with Wilder's smoothing
///
/// Returns a series aligned with `closes`. The first close has no prior bar
/// and contributes a zero gain and a zero loss. Average gain and loss are
/// exponentially smoothed with `alpha = 1 / period`, seeded with that first
/// zero step, and the RSI is reported once `period` steps have been seen.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
/// - No losses in the smoothed window: exactly 100
/// - Changes too large to represent (overflow): undefined
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; closes.len()];
    }

    let alpha = 1.0 / period as f64;
    let mut series = Vec::with_capacity(closes.len());
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 0..closes.len() {
        let change = if i == 0 { 0.0 } else { closes[i] - closes[i - 1] };
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i == 0 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain += alpha * (gain - avg_gain);
            avg_loss += alpha * (loss - avg_loss);
        }

        if i + 1 < period {
            series.push(None);
        } else {
            series.push(rsi_from_averages(avg_gain, avg_loss));
        }
    }

    series
}

/// Latest RSI value, or None during warm-up
pub fn calculate_rsi(closes: &[f64], period: usize) -> Option<f64> {
    rsi_series(closes, period).last().copied().flatten()
}

/// Undefined once a step overflowed and poisoned the averages
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if !(avg_gain.is_finite() && avg_loss.is_finite()) {
        return None;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}
