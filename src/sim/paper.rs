use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::candle_buffer::CandleBuffer;
use super::synthetic::{MarketScenario, SyntheticCandleGenerator};
use crate::broker::{MarketData, OrderExecutor};
use crate::error::EngineError;
use crate::models::{
    Account, Candle, ClosePositionRequest, Direction, OrderReceipt, OrderRequest, Position, Side,
    StopLossUpdateRequest, SymbolInfo, Tick, Timeframe,
};
use crate::Result;

/// Paper trading parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaperConfig {
    pub initial_balance: f64,
    pub base_price: f64,
    /// Fixed spread in price units
    pub spread: f64,
    pub scenario: MarketScenario,
    /// One-minute candles generated before the first cycle
    pub history_minutes: usize,
    pub symbol_info: SymbolInfo,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            base_price: 2000.0,
            spread: 0.25,
            scenario: MarketScenario::Alternating,
            history_minutes: 3000,
            symbol_info: SymbolInfo {
                tick_value: 1.0,
                tick_size: 0.01,
                point: 0.01,
                volume_min: 0.01,
            },
        }
    }
}

#[derive(Debug, Clone)]
struct PaperPosition {
    position: Position,
    volume: f64,
}

/// Closed paper trade, kept in memory for the run summary
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub ticket: u64,
    pub side: Side,
    pub volume: f64,
    pub open_price: f64,
    pub close_price: f64,
    pub pnl: f64,
}

/// In-memory broker over a synthetic one-minute price stream
///
/// Fills market orders at the quote, honours stop-loss and take-profit on
/// each new minute's range, and books realised P&L into the balance.
pub struct PaperBroker {
    symbol: String,
    config: PaperConfig,
    generator: SyntheticCandleGenerator,
    buffer: CandleBuffer,
    balance: f64,
    positions: Vec<PaperPosition>,
    closed: Vec<ClosedTrade>,
    next_ticket: u64,
    now: DateTime<Utc>,
}

impl PaperBroker {
    pub fn new(symbol: &str, config: PaperConfig, seed: u64, start: DateTime<Utc>) -> Self {
        let mut generator =
            SyntheticCandleGenerator::new(seed, config.scenario, config.base_price);
        let mut buffer = CandleBuffer::new(config.history_minutes.max(1));

        let history_start = start - Duration::minutes(config.history_minutes as i64);
        for candle in generator.generate(history_start, config.history_minutes, 1) {
            buffer.add_candle(candle);
        }

        tracing::info!(
            "Paper broker ready: {} {:?} @ {:.2}, balance ${:.2}",
            symbol,
            config.scenario,
            buffer.last().map(|c| c.close).unwrap_or(config.base_price),
            config.initial_balance
        );

        Self {
            symbol: symbol.to_string(),
            balance: config.initial_balance,
            config,
            generator,
            buffer,
            positions: Vec::new(),
            closed: Vec::new(),
            next_ticket: 1,
            now: start,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    /// Generate `minutes` new one-minute candles and settle stops hit on the way
    pub fn advance(&mut self, minutes: i64) {
        for _ in 0..minutes {
            let candle = self.generator.next_candle(self.now);
            self.now += Duration::minutes(1);
            self.settle_stops(&candle);
            self.buffer.add_candle(candle);
        }
    }

    fn last_price(&self) -> f64 {
        self.buffer
            .last()
            .map(|c| c.close)
            .unwrap_or(self.config.base_price)
    }

    fn quote(&self) -> Tick {
        let bid = self.last_price();
        Tick {
            bid,
            ask: bid + self.config.spread,
        }
    }

    fn check_symbol(&self, symbol: &str) -> Result<()> {
        if symbol != self.symbol {
            return Err(EngineError::MissingMarketInfo(format!(
                "unknown symbol {}",
                symbol
            )));
        }
        Ok(())
    }

    fn pnl(&self, side: Side, open: f64, close: f64, volume: f64) -> f64 {
        let info = &self.config.symbol_info;
        let diff = match side {
            Side::Long => close - open,
            Side::Short => open - close,
        };
        diff / info.tick_size * info.tick_value * volume
    }

    /// Close positions whose stop-loss or take-profit lies inside the bar.
    /// The stop wins when both are touched.
    fn settle_stops(&mut self, candle: &Candle) {
        let spread = self.config.spread;
        let mut hits = Vec::new();

        for paper in &self.positions {
            let pos = &paper.position;
            let exit = match pos.side {
                Side::Long => {
                    if pos.stop_loss.is_some_and(|sl| candle.low <= sl) {
                        pos.stop_loss
                    } else if pos.take_profit.is_some_and(|tp| candle.high >= tp) {
                        pos.take_profit
                    } else {
                        None
                    }
                }
                Side::Short => {
                    if pos.stop_loss.is_some_and(|sl| candle.high + spread >= sl) {
                        pos.stop_loss
                    } else if pos.take_profit.is_some_and(|tp| candle.low + spread <= tp) {
                        pos.take_profit
                    } else {
                        None
                    }
                }
            };

            if let Some(price) = exit {
                hits.push((pos.ticket, price));
            }
        }

        for (ticket, price) in hits {
            self.close_at(ticket, price);
        }
    }

    fn close_at(&mut self, ticket: u64, price: f64) -> Option<ClosedTrade> {
        let index = self.positions.iter().position(|p| p.position.ticket == ticket)?;
        let paper = self.positions.remove(index);
        let pos = paper.position;

        let pnl = self.pnl(pos.side, pos.open_price, price, paper.volume);
        self.balance += pnl;

        tracing::info!(
            "Paper position {} closed @ {:.2} (P&L ${:.2}, balance ${:.2})",
            ticket,
            price,
            pnl,
            self.balance
        );

        let trade = ClosedTrade {
            ticket,
            side: pos.side,
            volume: paper.volume,
            open_price: pos.open_price,
            close_price: price,
            pnl,
        };
        self.closed.push(trade.clone());
        Some(trade)
    }
}

impl MarketData for PaperBroker {
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>> {
        self.check_symbol(symbol)?;

        let candles = self.buffer.get_recent_candles(timeframe, count);
        if candles.len() < count {
            return Err(EngineError::InsufficientData {
                have: candles.len(),
                need: count,
            });
        }

        Ok(candles)
    }

    fn fetch_account(&self) -> Result<Account> {
        Ok(Account {
            balance: self.balance,
        })
    }

    fn fetch_symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        self.check_symbol(symbol)?;
        Ok(self.config.symbol_info.clone())
    }

    fn fetch_open_positions(&self, symbol: &str) -> Result<Vec<Position>> {
        self.check_symbol(symbol)?;
        Ok(self.positions.iter().map(|p| p.position.clone()).collect())
    }

    fn fetch_tick(&self, symbol: &str) -> Result<Tick> {
        self.check_symbol(symbol)?;
        Ok(self.quote())
    }
}

impl OrderExecutor for PaperBroker {
    fn submit_order(&mut self, order: &OrderRequest) -> Result<OrderReceipt> {
        let tick = self.quote();
        let (side, fill_price) = match order.direction {
            Direction::Buy => (Side::Long, tick.ask),
            Direction::Sell => (Side::Short, tick.bid),
            Direction::None => {
                return Err(EngineError::ExecutionRejected(
                    "order without direction".to_string(),
                ))
            }
        };

        if !(order.volume >= self.config.symbol_info.volume_min) {
            return Err(EngineError::ExecutionRejected(format!(
                "volume {} below minimum {}",
                order.volume, self.config.symbol_info.volume_min
            )));
        }

        let stops_valid = match side {
            Side::Long => order.stop_loss < fill_price && order.take_profit > fill_price,
            Side::Short => order.stop_loss > fill_price && order.take_profit < fill_price,
        };
        if !stops_valid {
            return Err(EngineError::ExecutionRejected(format!(
                "invalid stops: sl {:.2} tp {:.2} around {:.2}",
                order.stop_loss, order.take_profit, fill_price
            )));
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        self.positions.push(PaperPosition {
            position: Position {
                ticket,
                side,
                open_price: fill_price,
                stop_loss: Some(order.stop_loss),
                take_profit: Some(order.take_profit),
                open_time: self.now,
            },
            volume: order.volume,
        });

        Ok(OrderReceipt {
            ticket,
            fill_price,
            volume: order.volume,
        })
    }

    fn modify_stop_loss(&mut self, request: &StopLossUpdateRequest) -> Result<()> {
        let tick = self.quote();
        let paper = self
            .positions
            .iter_mut()
            .find(|p| p.position.ticket == request.ticket)
            .ok_or_else(|| {
                EngineError::ExecutionRejected(format!("position {} not found", request.ticket))
            })?;

        let valid = match paper.position.side {
            Side::Long => request.new_stop_loss < tick.bid,
            Side::Short => request.new_stop_loss > tick.ask,
        };
        if !valid {
            return Err(EngineError::ExecutionRejected(format!(
                "stop {:.2} on the wrong side of the market",
                request.new_stop_loss
            )));
        }

        paper.position.stop_loss = Some(request.new_stop_loss);
        paper.position.take_profit = request.take_profit;
        Ok(())
    }

    fn close_position(&mut self, request: &ClosePositionRequest) -> Result<()> {
        let tick = self.quote();
        let side = self
            .positions
            .iter()
            .find(|p| p.position.ticket == request.ticket)
            .map(|p| p.position.side)
            .ok_or_else(|| {
                EngineError::ExecutionRejected(format!("position {} not found", request.ticket))
            })?;

        let price = match side {
            Side::Long => tick.bid,
            Side::Short => tick.ask,
        };
        self.close_at(request.ticket, price);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CloseReason, StopReason};
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap()
    }

    fn broker() -> PaperBroker {
        PaperBroker::new("XAUUSD", PaperConfig::default(), 42, start())
    }

    fn buy_order(broker: &PaperBroker, volume: f64) -> OrderRequest {
        let ask = broker.quote().ask;
        OrderRequest {
            direction: Direction::Buy,
            volume,
            price: ask,
            stop_loss: ask - 3.0,
            take_profit: ask + 4.0,
        }
    }

    #[test]
    fn test_history_is_available() {
        let broker = broker();

        let m5 = broker.fetch_candles("XAUUSD", Timeframe::M5, 100).unwrap();
        let m15 = broker.fetch_candles("XAUUSD", Timeframe::M15, 100).unwrap();
        assert_eq!(m5.len(), 100);
        assert_eq!(m15.len(), 100);
        assert!(m5.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_unknown_symbol() {
        let broker = broker();
        assert!(matches!(
            broker.fetch_tick("EURUSD"),
            Err(EngineError::MissingMarketInfo(_))
        ));
    }

    #[test]
    fn test_insufficient_history() {
        let config = PaperConfig {
            history_minutes: 200,
            ..Default::default()
        };
        let broker = PaperBroker::new("XAUUSD", config, 1, start());

        assert!(matches!(
            broker.fetch_candles("XAUUSD", Timeframe::M15, 100),
            Err(EngineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_submit_and_modify() {
        let mut broker = broker();
        let order = buy_order(&broker, 0.2);

        let receipt = broker.submit_order(&order).unwrap();
        assert_eq!(receipt.ticket, 1);
        assert_eq!(receipt.volume, 0.2);

        let positions = broker.fetch_open_positions("XAUUSD").unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].side, Side::Long);
        assert_eq!(positions[0].stop_loss, Some(order.stop_loss));

        let update = StopLossUpdateRequest {
            ticket: 1,
            new_stop_loss: order.stop_loss + 1.0,
            take_profit: positions[0].take_profit,
            reason: StopReason::Trailing,
        };
        broker.modify_stop_loss(&update).unwrap();
        let positions = broker.fetch_open_positions("XAUUSD").unwrap();
        assert_eq!(positions[0].stop_loss, Some(order.stop_loss + 1.0));
        assert_eq!(positions[0].take_profit, Some(order.take_profit));
    }

    #[test]
    fn test_rejects_invalid_orders() {
        let mut broker = broker();

        let tiny = buy_order(&broker, 0.001);
        assert!(matches!(
            broker.submit_order(&tiny),
            Err(EngineError::ExecutionRejected(_))
        ));

        let mut inverted = buy_order(&broker, 0.1);
        inverted.stop_loss = inverted.price + 1.0;
        assert!(matches!(
            broker.submit_order(&inverted),
            Err(EngineError::ExecutionRejected(_))
        ));

        let missing = StopLossUpdateRequest {
            ticket: 99,
            new_stop_loss: 1.0,
            take_profit: None,
            reason: StopReason::BreakEven,
        };
        assert!(broker.modify_stop_loss(&missing).is_err());
    }

    #[test]
    fn test_close_position_books_pnl() {
        let mut broker = broker();
        broker.submit_order(&buy_order(&broker, 0.1)).unwrap();

        broker
            .close_position(&ClosePositionRequest {
                ticket: 1,
                reason: CloseReason::MaxHoldingTime,
            })
            .unwrap();

        assert_eq!(broker.open_position_count(), 0);
        let trades = broker.closed_trades();
        assert_eq!(trades.len(), 1);
        // Immediate close pays the spread: 0.25 / 0.01 * 1.0 * 0.1
        assert!((trades[0].pnl + 2.5).abs() < 1e-6);
        assert!((broker.balance() - 9997.5).abs() < 1e-6);
    }

    #[test]
    fn test_stops_settle_on_advance() {
        let mut broker = broker();
        let mut order = buy_order(&broker, 0.1);
        // Tight bracket so a few hours of movement hit one side
        order.stop_loss = order.price - 0.5;
        order.take_profit = order.price + 0.5;
        broker.submit_order(&order).unwrap();

        broker.advance(240);

        assert_eq!(broker.open_position_count(), 0);
        assert_eq!(broker.closed_trades().len(), 1);
        assert_eq!(broker.now(), start() + Duration::minutes(240));
    }
}
