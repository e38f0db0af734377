use super::{
    signals::{evaluate_snapshots, SignalConfig},
    Strategy,
};
use crate::indicators::{IndicatorConfig, IndicatorEngine};
use crate::models::{Candle, Signal};

/// Trend-following entry with momentum confirmation
///
/// The trend timeframe sets the direction (EMA fast vs slow), the entry
/// timeframe must agree, and the entry RSI must sit in a safe band that
/// avoids chasing overbought or oversold moves. Only the last closed candle
/// of each window is used, so a forming candle can never repaint a decision.
#[derive(Debug, Clone)]
pub struct TrendMomentumStrategy {
    engine: IndicatorEngine,
    config: SignalConfig,
}

impl TrendMomentumStrategy {
    pub fn new(indicators: IndicatorConfig, config: SignalConfig) -> Self {
        Self {
            engine: IndicatorEngine::new(indicators),
            config,
        }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }
}

impl Default for TrendMomentumStrategy {
    fn default() -> Self {
        Self::new(IndicatorConfig::default(), SignalConfig::default())
    }
}

impl Strategy for TrendMomentumStrategy {
    fn generate_signal(&self, entry: &[Candle], trend: &[Candle]) -> Signal {
        let entry_snapshot = match self.engine.last_closed(entry) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!("Entry window unusable: {}", e);
                return Signal::none();
            }
        };

        let trend_snapshot = match self.engine.last_closed(trend) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!("Trend window unusable: {}", e);
                return Signal::none();
            }
        };

        let signal = evaluate_snapshots(&entry_snapshot, &trend_snapshot, &self.config);

        tracing::debug!(
            "Evaluated {}: entry EMA {:?}/{:?} RSI {:?} ATR {:?}, trend EMA {:?}/{:?} -> {:?}",
            self.name(),
            entry_snapshot.ema_fast,
            entry_snapshot.ema_slow,
            entry_snapshot.rsi,
            entry_snapshot.atr,
            trend_snapshot.ema_fast,
            trend_snapshot.ema_slow,
            signal.direction
        );

        signal
    }

    fn name(&self) -> &str {
        "TrendMomentum"
    }

    fn min_candles_required(&self) -> usize {
        self.engine.min_candles_required()
    }
}
