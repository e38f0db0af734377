/// Average True Range (ATR) indicator
///
/// Measures market volatility as the simple rolling mean of true ranges.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// The first candle of a window has no previous close; its true range is
/// just High - Low.
use super::moving_average::calculate_sma;
use crate::models::Candle;

/// True range series aligned with `candles`
pub fn true_range_series(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let range = candle.high - candle.low;
            if i == 0 {
                return range;
            }

            let prev_close = candles[i - 1].close;
            range
                .max((candle.high - prev_close).abs())
                .max((candle.low - prev_close).abs())
        })
        .collect()
}

/// ATR series aligned with `candles`, undefined until `period` true ranges exist
pub fn atr_series(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let true_ranges = true_range_series(candles);

    (0..true_ranges.len())
        .map(|i| calculate_sma(&true_ranges[..=i], period))
        .collect()
}

/// Latest ATR value, or None if insufficient data
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period {
        return None;
    }

    let true_ranges = true_range_series(candles);
    calculate_sma(&true_ranges, period)
}
