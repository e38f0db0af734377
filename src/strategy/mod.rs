// Trading strategy module
pub mod signals;
pub mod trend_momentum;

pub use signals::{evaluate_snapshots, SignalConfig};
pub use trend_momentum::TrendMomentumStrategy;

use crate::models::{Candle, Signal};

/// Base trait for multi-timeframe strategies
pub trait Strategy: Send + Sync {
    /// Generate a trading signal from the entry and trend candle windows
    ///
    /// Both windows are oldest-first and end with the still-forming candle.
    /// Missing or malformed data yields a `None` signal, never an error.
    fn generate_signal(&self, entry: &[Candle], trend: &[Candle]) -> Signal;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required per window
    fn min_candles_required(&self) -> usize;
}
