use crate::error::EngineError;
use crate::models::{Account, Direction, OrderRequest, Signal, SymbolInfo, Tick};
use crate::risk::{RiskConfig, RiskSizer};
use crate::Result;

/// Turns a directional signal into a market order request
///
/// Gates on spread, places the stop-loss and take-profit at ATR multiples
/// from the fill side of the quote, and sizes the order with `RiskSizer`.
#[derive(Debug, Clone)]
pub struct OrderPlanner {
    sizer: RiskSizer,
}

impl OrderPlanner {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            sizer: RiskSizer::new(config),
        }
    }

    pub fn sizer(&self) -> &RiskSizer {
        &self.sizer
    }

    /// Spread of `tick` expressed in symbol points
    ///
    /// Non-finite or crossed quotes are unusable and count as missing.
    pub fn spread_points(tick: &Tick, symbol: &SymbolInfo) -> Result<f64> {
        if !(tick.bid.is_finite() && tick.ask.is_finite()) {
            return Err(EngineError::MissingMarketInfo(format!(
                "unusable quote bid {} ask {}",
                tick.bid, tick.ask
            )));
        }

        if tick.ask < tick.bid {
            return Err(EngineError::MissingMarketInfo(format!(
                "crossed quote bid {} ask {}",
                tick.bid, tick.ask
            )));
        }

        if !(symbol.point.is_finite() && symbol.point > 0.0) {
            return Err(EngineError::MissingMarketInfo(format!(
                "invalid point size {}",
                symbol.point
            )));
        }

        Ok(tick.spread() / symbol.point)
    }

    /// Build the order for `signal`, or explain why none should be sent
    ///
    /// A missing account only degrades sizing to the fallback lot; a missing
    /// quote or symbol spec declines the trade.
    pub fn plan(
        &self,
        signal: &Signal,
        tick: Option<&Tick>,
        symbol: Option<&SymbolInfo>,
        account: Option<&Account>,
    ) -> Result<OrderRequest> {
        if !signal.is_actionable() {
            return Err(EngineError::NoSignal);
        }

        let tick = tick.ok_or_else(|| EngineError::MissingMarketInfo("tick".to_string()))?;
        let symbol =
            symbol.ok_or_else(|| EngineError::MissingMarketInfo("symbol info".to_string()))?;

        let config = self.sizer.config();
        let spread_points = Self::spread_points(tick, symbol)?;
        if !(spread_points <= config.max_spread_points) {
            return Err(EngineError::SpreadTooWide {
                spread_points,
                max_points: config.max_spread_points,
            });
        }

        let sl_distance = signal.atr * config.sl_atr_multiplier;
        let tp_distance = signal.atr * config.tp_atr_multiplier;

        let (price, stop_loss, take_profit) = match signal.direction {
            Direction::Buy => (tick.ask, tick.ask - sl_distance, tick.ask + tp_distance),
            Direction::Sell => (tick.bid, tick.bid + sl_distance, tick.bid - tp_distance),
            Direction::None => return Err(EngineError::NoSignal),
        };

        let volume = self.sizer.lot_size(account, Some(symbol), signal.atr);

        Ok(OrderRequest {
            direction: signal.direction,
            volume,
            price,
            stop_loss,
            take_profit,
        })
    }
}

impl Default for OrderPlanner {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}
