use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::indicators::IndicatorSnapshot;
use crate::models::{Direction, Signal};
use crate::Result;

/// RSI bands for the multi-timeframe trend/momentum rules
///
/// Bounds are exclusive on both sides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignalConfig {
    /// Momentum must be positive
    pub rsi_buy_min: f64,
    /// Don't buy if overbought
    pub rsi_buy_max: f64,
    /// Don't sell if oversold
    pub rsi_sell_min: f64,
    /// Momentum must be negative
    pub rsi_sell_max: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rsi_buy_min: 50.0,
            rsi_buy_max: 70.0,
            rsi_sell_min: 30.0,
            rsi_sell_max: 50.0,
        }
    }
}

impl SignalConfig {
    /// Bands must be well ordered and must not overlap
    pub fn validate(&self) -> Result<()> {
        if !(self.rsi_buy_min < self.rsi_buy_max) || !(self.rsi_sell_min < self.rsi_sell_max) {
            return Err(EngineError::InvalidConfig(
                "RSI band minimum must be below its maximum".to_string(),
            ));
        }

        if self.rsi_sell_max > self.rsi_buy_min {
            return Err(EngineError::InvalidConfig(format!(
                "RSI sell band (<{}) overlaps buy band (>{})",
                self.rsi_sell_max, self.rsi_buy_min
            )));
        }

        Ok(())
    }
}

/// Combine entry- and trend-timeframe snapshots of the same instant into a signal
///
/// Buy needs both timeframes' fast EMA above the slow EMA and entry RSI inside
/// the buy band; Sell mirrors it. Any undefined indicator, or an ATR that is
/// not strictly positive, yields `Direction::None` with a zero ATR.
pub fn evaluate_snapshots(
    entry: &IndicatorSnapshot,
    trend: &IndicatorSnapshot,
    config: &SignalConfig,
) -> Signal {
    let (
        Some(entry_fast),
        Some(entry_slow),
        Some(rsi),
        Some(atr),
        Some(trend_fast),
        Some(trend_slow),
    ) = (
        entry.ema_fast,
        entry.ema_slow,
        entry.rsi,
        entry.atr,
        trend.ema_fast,
        trend.ema_slow,
    )
    else {
        return Signal::none();
    };

    if !(atr.is_finite() && atr > 0.0) {
        return Signal::none();
    }

    let trend_buy = trend_fast > trend_slow;
    let entry_buy = entry_fast > entry_slow;
    let rsi_buy = config.rsi_buy_min < rsi && rsi < config.rsi_buy_max;

    if trend_buy && entry_buy && rsi_buy {
        return Signal {
            direction: Direction::Buy,
            atr,
        };
    }

    let trend_sell = trend_fast < trend_slow;
    let entry_sell = entry_fast < entry_slow;
    let rsi_sell = config.rsi_sell_min < rsi && rsi < config.rsi_sell_max;

    if trend_sell && entry_sell && rsi_sell {
        return Signal {
            direction: Direction::Sell,
            atr,
        };
    }

    Signal::none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(ema_fast: f64, ema_slow: f64, rsi: f64, atr: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            ema_fast: Some(ema_fast),
            ema_slow: Some(ema_slow),
            rsi: Some(rsi),
            atr: Some(atr),
        }
    }

    #[test]
    fn test_buy_signal() {
        let entry = snapshot(101.0, 100.0, 60.0, 2.0);
        let trend = snapshot(102.0, 100.0, 55.0, 3.0);

        let signal = evaluate_snapshots(&entry, &trend, &SignalConfig::default());
        assert_eq!(signal.direction, Direction::Buy);
        assert_eq!(signal.atr, 2.0); // entry timeframe ATR
    }

    #[test]
    fn test_overbought_blocks_buy() {
        let entry = snapshot(101.0, 100.0, 75.0, 2.0);
        let trend = snapshot(102.0, 100.0, 55.0, 3.0);

        let signal = evaluate_snapshots(&entry, &trend, &SignalConfig::default());
        assert_eq!(signal, Signal::none());
    }

    #[test]
    fn test_sell_signal() {
        let entry = snapshot(99.0, 100.0, 40.0, 1.5);
        let trend = snapshot(98.0, 100.0, 45.0, 3.0);

        let signal = evaluate_snapshots(&entry, &trend, &SignalConfig::default());
        assert_eq!(signal.direction, Direction::Sell);
        assert_eq!(signal.atr, 1.5);
    }

    #[test]
    fn test_oversold_blocks_sell() {
        let entry = snapshot(99.0, 100.0, 25.0, 1.5);
        let trend = snapshot(98.0, 100.0, 45.0, 3.0);

        let signal = evaluate_snapshots(&entry, &trend, &SignalConfig::default());
        assert_eq!(signal.direction, Direction::None);
    }

    #[test]
    fn test_band_edges_are_exclusive() {
        let trend = snapshot(102.0, 100.0, 55.0, 3.0);
        for rsi in [50.0, 70.0] {
            let entry = snapshot(101.0, 100.0, rsi, 2.0);
            let signal = evaluate_snapshots(&entry, &trend, &SignalConfig::default());
            assert_eq!(signal.direction, Direction::None, "rsi {}", rsi);
        }
    }

    #[test]
    fn test_timeframes_must_agree() {
        // Entry bullish, trend bearish
        let entry = snapshot(101.0, 100.0, 60.0, 2.0);
        let trend = snapshot(98.0, 100.0, 45.0, 3.0);

        let signal = evaluate_snapshots(&entry, &trend, &SignalConfig::default());
        assert_eq!(signal.direction, Direction::None);
    }

    #[test]
    fn test_undefined_indicator_yields_none() {
        let mut entry = snapshot(101.0, 100.0, 60.0, 2.0);
        entry.rsi = None;
        let trend = snapshot(102.0, 100.0, 55.0, 3.0);
        assert_eq!(
            evaluate_snapshots(&entry, &trend, &SignalConfig::default()),
            Signal::none()
        );

        let entry = snapshot(101.0, 100.0, 60.0, 2.0);
        let mut trend = snapshot(102.0, 100.0, 55.0, 3.0);
        trend.ema_slow = None;
        assert_eq!(
            evaluate_snapshots(&entry, &trend, &SignalConfig::default()),
            Signal::none()
        );
    }

    #[test]
    fn test_zero_atr_yields_none() {
        let entry = snapshot(101.0, 100.0, 60.0, 0.0);
        let trend = snapshot(102.0, 100.0, 55.0, 3.0);
        assert_eq!(
            evaluate_snapshots(&entry, &trend, &SignalConfig::default()),
            Signal::none()
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(SignalConfig::default().validate().is_ok());

        let overlapping = SignalConfig {
            rsi_sell_max: 55.0,
            ..Default::default()
        };
        assert!(overlapping.validate().is_err());

        let inverted = SignalConfig {
            rsi_buy_min: 80.0,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }
}
