// Broker ports
//
// The engine reads market state and submits requests only through these
// traits; platform connectivity lives behind them.

use crate::models::{
    Account, Candle, ClosePositionRequest, OrderReceipt, OrderRequest, Position,
    StopLossUpdateRequest, SymbolInfo, Tick, Timeframe,
};
use crate::Result;

/// Read-only view of account, symbol and market state
pub trait MarketData {
    /// Last `count` candles, oldest first, ending with the forming candle
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>>;

    fn fetch_account(&self) -> Result<Account>;

    fn fetch_symbol_info(&self, symbol: &str) -> Result<SymbolInfo>;

    fn fetch_open_positions(&self, symbol: &str) -> Result<Vec<Position>>;

    fn fetch_tick(&self, symbol: &str) -> Result<Tick>;
}

/// Submits the engine's proposals to the trading platform
///
/// Implementations report platform refusals as `EngineError::ExecutionRejected`.
pub trait OrderExecutor {
    fn submit_order(&mut self, order: &OrderRequest) -> Result<OrderReceipt>;

    fn modify_stop_loss(&mut self, request: &StopLossUpdateRequest) -> Result<()>;

    fn close_position(&mut self, request: &ClosePositionRequest) -> Result<()>;
}

/// A platform connection that serves both ports, as the paper broker does
pub trait Broker: MarketData + OrderExecutor {}

impl<T: MarketData + OrderExecutor> Broker for T {}
