/// Calculate Simple Moving Average (SMA) of the last `period` values
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Exponential Moving Average series aligned with `prices`
///
/// Seeded with the first price (no SMA warm-up), then
/// `ema = prev + alpha * (price - prev)` with `alpha = 2 / (span + 1)`.
/// Every element is defined once the input is non-empty.
pub fn ema_series(prices: &[f64], span: usize) -> Vec<Option<f64>> {
    let alpha = 2.0 / (span as f64 + 1.0);

    let mut series = Vec::with_capacity(prices.len());
    let mut ema: Option<f64> = None;
    for &price in prices {
        let next = match ema {
            None => price,
            Some(prev) => prev + alpha * (price - prev),
        };
        ema = Some(next);
        series.push(ema);
    }

    series
}

/// Latest EMA value, or None for an empty input
pub fn calculate_ema(prices: &[f64], span: usize) -> Option<f64> {
    ema_series(prices, span).last().copied().flatten()
}
