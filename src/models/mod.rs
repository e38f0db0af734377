use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OHLC candlestick for a single closed (or still forming) bar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Chart timeframe of a candle window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }
}

/// Trade direction produced by the signal evaluator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
    None,
}

/// Trading signal: direction plus the entry-timeframe ATR it was taken on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub direction: Direction,
    pub atr: f64,
}

impl Signal {
    pub fn none() -> Self {
        Self {
            direction: Direction::None,
            atr: 0.0,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.direction != Direction::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub balance: f64,
}

/// Contract specification of the traded symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolInfo {
    pub tick_value: f64,
    pub tick_size: f64,
    pub point: f64,
    pub volume_min: f64,
}

/// Latest bid/ask quote
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
}

impl Tick {
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

/// Open position as reported by the broker
///
/// The engine never mutates a position; it only proposes requests against it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub ticket: u64,
    pub side: Side,
    pub open_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub open_time: DateTime<Utc>,
}

impl Position {
    /// Price the position would close at: bid for longs, ask for shorts
    pub fn market_price(&self, tick: &Tick) -> f64 {
        match self.side {
            Side::Long => tick.bid,
            Side::Short => tick.ask,
        }
    }

    /// Signed distance the market has moved in the position's favour
    pub fn favorable_distance(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => price - self.open_price,
            Side::Short => self.open_price - price,
        }
    }

    /// Whether the stop-loss already sits on the profit side of the entry.
    ///
    /// Derived from the live stop-loss every time; a position without a
    /// stop-loss is never at break-even.
    pub fn is_at_break_even(&self) -> bool {
        match (self.side, self.stop_loss) {
            (Side::Long, Some(sl)) => sl >= self.open_price,
            (Side::Short, Some(sl)) => sl <= self.open_price,
            (_, None) => false,
        }
    }

    /// Whether `candidate` would move the stop further in the profit direction
    pub fn tightens_stop(&self, candidate: f64) -> bool {
        match (self.side, self.stop_loss) {
            (Side::Long, Some(sl)) => candidate > sl,
            (Side::Short, Some(sl)) => candidate < sl,
            (_, None) => true,
        }
    }
}

/// Market order for the executor to submit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub direction: Direction,
    pub volume: f64,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    BreakEven,
    Trailing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopLossUpdateRequest {
    pub ticket: u64,
    pub new_stop_loss: f64,
    pub take_profit: Option<f64>,
    pub reason: StopReason,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CloseReason {
    MaxHoldingTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosePositionRequest {
    pub ticket: u64,
    pub reason: CloseReason,
}

/// Action proposed by the position manager for one open position
#[derive(Debug, Clone, PartialEq)]
pub enum PositionAction {
    MoveStopLoss(StopLossUpdateRequest),
    Close(ClosePositionRequest),
}

impl PositionAction {
    pub fn ticket(&self) -> u64 {
        match self {
            PositionAction::MoveStopLoss(req) => req.ticket,
            PositionAction::Close(req) => req.ticket,
        }
    }
}

/// Broker acknowledgement of a filled order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderReceipt {
    pub ticket: u64,
    pub fill_price: f64,
    pub volume: f64,
}
