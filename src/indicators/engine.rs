use serde::{Deserialize, Serialize};

use super::{atr_series, ema_series, rsi_series};
use crate::error::EngineError;
use crate::models::Candle;
use crate::Result;

/// Indicator parameters for one candle window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ema_fast_span: usize,
    pub ema_slow_span: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    /// Candles fetched per timeframe; shorter windows are rejected
    pub lookback: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_fast_span: 20,
            ema_slow_span: 50,
            rsi_period: 14,
            atr_period: 14,
            lookback: 100,
        }
    }
}

/// Indicator values for a single candle; `None` while still warming up
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
}

/// Computes EMA(fast), EMA(slow), RSI and ATR over a candle window.
///
/// Stateless: every call recomputes from the window it is given.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn min_candles_required(&self) -> usize {
        self.config.lookback
    }

    /// Snapshots aligned one-to-one with `candles`
    pub fn compute(&self, candles: &[Candle]) -> Result<Vec<IndicatorSnapshot>> {
        let need = self.min_candles_required();
        if candles.len() < need {
            return Err(EngineError::InsufficientData {
                have: candles.len(),
                need,
            });
        }

        if let Some(index) = candles.iter().position(|c| !is_well_formed(c)) {
            return Err(EngineError::MalformedCandle { index });
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let ema_fast = ema_series(&closes, self.config.ema_fast_span);
        let ema_slow = ema_series(&closes, self.config.ema_slow_span);
        let rsi = rsi_series(&closes, self.config.rsi_period);
        let atr = atr_series(candles, self.config.atr_period);

        Ok((0..candles.len())
            .map(|i| IndicatorSnapshot {
                ema_fast: ema_fast[i],
                ema_slow: ema_slow[i],
                rsi: rsi[i],
                atr: atr[i],
            })
            .collect())
    }

    /// Snapshot of the last fully closed candle (second-to-last in the window)
    pub fn last_closed(&self, candles: &[Candle]) -> Result<IndicatorSnapshot> {
        let snapshots = self.compute(candles)?;
        if snapshots.len() < 2 {
            return Err(EngineError::InsufficientData {
                have: snapshots.len(),
                need: 2,
            });
        }

        Ok(snapshots[snapshots.len() - 2])
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(IndicatorConfig::default())
    }
}

fn is_well_formed(candle: &Candle) -> bool {
    let prices = [candle.open, candle.high, candle.low, candle.close];
    prices.iter().all(|p| p.is_finite()) && candle.high >= candle.low
}
