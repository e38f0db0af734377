use chrono::{DateTime, Utc};

use super::scheduler::Scheduler;
use crate::broker::Broker;
use crate::config::{InstrumentConfig, Settings};
use crate::error::EngineError;
use crate::execution::{OrderPlanner, PositionManager};
use crate::indicators::IndicatorEngine;
use crate::models::{Candle, OrderReceipt, OrderRequest, Position, PositionAction, Signal};
use crate::strategy::{Strategy, TrendMomentumStrategy};
use crate::Result;

/// Result of submitting one position action
#[derive(Debug)]
pub struct ActionOutcome {
    pub action: PositionAction,
    pub error: Option<EngineError>,
}

/// What happened to the entry side of a cycle
#[derive(Debug)]
pub enum EntryOutcome {
    /// Entries were not considered (cooldown, session, open position)
    Blocked(String),
    NoSignal,
    /// A signal was found but the planner declined to trade it
    Declined(EngineError),
    Filled {
        order: OrderRequest,
        receipt: OrderReceipt,
    },
    Rejected {
        order: OrderRequest,
        error: EngineError,
    },
}

/// Everything one cycle did, for logging and tests
#[derive(Debug)]
pub struct CycleReport {
    pub position_actions: Vec<ActionOutcome>,
    /// `None` when entries were blocked or the windows could not be read
    pub signal: Option<Signal>,
    pub entry: EntryOutcome,
    /// Market data could not be read at some point in the cycle
    pub data_failed: bool,
}

/// Runs one decision cycle against a broker: manage positions, then look for an entry.
pub struct TradingEngine<S: Strategy = TrendMomentumStrategy> {
    instrument: InstrumentConfig,
    indicators: IndicatorEngine,
    strategy: S,
    manager: PositionManager,
    planner: OrderPlanner,
    scheduler: Scheduler,
}

impl TradingEngine<TrendMomentumStrategy> {
    pub fn new(settings: &Settings) -> Result<Self> {
        let strategy =
            TrendMomentumStrategy::new(settings.indicators.clone(), settings.signal.clone());
        Self::with_strategy(settings, strategy)
    }
}

impl<S: Strategy> TradingEngine<S> {
    pub fn with_strategy(settings: &Settings, strategy: S) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            instrument: settings.instrument.clone(),
            indicators: IndicatorEngine::new(settings.indicators.clone()),
            strategy,
            manager: PositionManager::new(settings.management.clone()),
            planner: OrderPlanner::new(settings.risk.clone()),
            scheduler: Scheduler::new(settings.scheduler.clone()),
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Delay the caller should wait before the next cycle
    pub fn next_delay(&self) -> std::time::Duration {
        self.scheduler.next_delay()
    }

    /// Run one cycle. Never fails: declines and rejections land in the report.
    pub fn run_cycle<B: Broker>(&mut self, broker: &mut B, now: DateTime<Utc>) -> CycleReport {
        let symbol = self.instrument.symbol.clone();
        let count = self.strategy.min_candles_required();
        let mut data_failed = false;

        let positions = match broker.fetch_open_positions(&symbol) {
            Ok(positions) => Some(positions),
            Err(e) => {
                tracing::warn!("Failed to fetch open positions for {}: {}", symbol, e);
                data_failed = true;
                None
            }
        };

        let entry_window =
            match broker.fetch_candles(&symbol, self.instrument.entry_timeframe, count) {
                Ok(candles) => Some(candles),
                Err(e) => {
                    tracing::warn!(
                        "Failed to fetch {:?} candles for {}: {}",
                        self.instrument.entry_timeframe,
                        symbol,
                        e
                    );
                    data_failed = true;
                    None
                }
            };

        // Positions are always managed before any new entry is considered
        let position_actions = match positions.as_deref() {
            Some(open) if !open.is_empty() => {
                self.manage_positions(broker, open, entry_window.as_deref(), now)
            }
            _ => Vec::new(),
        };

        let (signal, entry) = match self.entry_block(positions.as_deref(), now) {
            Some(reason) => {
                tracing::debug!("Entries blocked: {}", reason);
                (None, EntryOutcome::Blocked(reason))
            }
            None => match self.fetch_trend_window(broker, count) {
                Some(trend_window) => match entry_window.as_deref() {
                    Some(entry_window) => {
                        let signal = self.strategy.generate_signal(entry_window, &trend_window);
                        let entry = self.try_entry(broker, &signal, now);
                        (Some(signal), entry)
                    }
                    None => (None, EntryOutcome::NoSignal),
                },
                None => {
                    data_failed = true;
                    (None, EntryOutcome::NoSignal)
                }
            },
        };

        self.scheduler.record_cycle(data_failed);

        CycleReport {
            position_actions,
            signal,
            entry,
            data_failed,
        }
    }

    fn fetch_trend_window<B: Broker>(&self, broker: &B, count: usize) -> Option<Vec<Candle>> {
        match broker.fetch_candles(&self.instrument.symbol, self.instrument.trend_timeframe, count)
        {
            Ok(candles) => Some(candles),
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch {:?} candles for {}: {}",
                    self.instrument.trend_timeframe,
                    self.instrument.symbol,
                    e
                );
                None
            }
        }
    }

    fn entry_block(
        &mut self,
        positions: Option<&[Position]>,
        now: DateTime<Utc>,
    ) -> Option<String> {
        if let Some(reason) = self.scheduler.entry_block(now) {
            return Some(reason);
        }

        if self.scheduler.config().single_position {
            match positions {
                Some(open) if !open.is_empty() => {
                    return Some(format!("{} position(s) already open", open.len()))
                }
                None => return Some("open positions unknown".to_string()),
                _ => {}
            }
        }

        None
    }

    fn manage_positions<B: Broker>(
        &self,
        broker: &mut B,
        positions: &[Position],
        entry_window: Option<&[Candle]>,
        now: DateTime<Utc>,
    ) -> Vec<ActionOutcome> {
        let symbol = &self.instrument.symbol;

        let tick = match broker.fetch_tick(symbol) {
            Ok(tick) => tick,
            Err(e) => {
                tracing::warn!("Skipping position management, no quote: {}", e);
                return Vec::new();
            }
        };

        let info = match broker.fetch_symbol_info(symbol) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("Skipping position management, no symbol info: {}", e);
                return Vec::new();
            }
        };

        // Without ATR only the max-holding rule can still fire
        let atr = match entry_window.map(|w| self.indicators.last_closed(w)) {
            Some(Ok(snapshot)) => snapshot.atr.unwrap_or(f64::NAN),
            Some(Err(e)) => {
                tracing::warn!("No ATR for position management: {}", e);
                f64::NAN
            }
            None => f64::NAN,
        };

        self.manager
            .evaluate_all(positions, &tick, info.point, atr, now)
            .into_iter()
            .map(|action| {
                let result = match &action {
                    PositionAction::MoveStopLoss(request) => broker.modify_stop_loss(request),
                    PositionAction::Close(request) => broker.close_position(request),
                };

                match &result {
                    Ok(()) => {
                        tracing::info!("✓ {} on position {}", describe(&action), action.ticket())
                    }
                    Err(e) => tracing::warn!(
                        "✗ {} on position {} failed: {}",
                        describe(&action),
                        action.ticket(),
                        e
                    ),
                }

                ActionOutcome {
                    action,
                    error: result.err(),
                }
            })
            .collect()
    }

    fn try_entry<B: Broker>(
        &mut self,
        broker: &mut B,
        signal: &Signal,
        now: DateTime<Utc>,
    ) -> EntryOutcome {
        if !signal.is_actionable() {
            return EntryOutcome::NoSignal;
        }

        tracing::info!(
            "Signal {:?} on {} (ATR {:.5})",
            signal.direction,
            self.instrument.symbol,
            signal.atr
        );
        self.scheduler.on_signal(now);

        let outcome = self.submit_entry(broker, signal);
        self.scheduler.on_entry_attempted(now);
        outcome
    }

    fn submit_entry<B: Broker>(&self, broker: &mut B, signal: &Signal) -> EntryOutcome {
        let symbol = &self.instrument.symbol;

        let tick = broker
            .fetch_tick(symbol)
            .map_err(|e| tracing::warn!("No quote for entry: {}", e))
            .ok();
        let info = broker
            .fetch_symbol_info(symbol)
            .map_err(|e| tracing::warn!("No symbol info for entry: {}", e))
            .ok();
        let account = broker
            .fetch_account()
            .map_err(|e| tracing::warn!("No account info, sizing falls back: {}", e))
            .ok();

        let order = match self
            .planner
            .plan(signal, tick.as_ref(), info.as_ref(), account.as_ref())
        {
            Ok(order) => order,
            Err(e) => {
                tracing::info!("  → Declined {:?}: {}", signal.direction, e);
                return EntryOutcome::Declined(e);
            }
        };

        tracing::info!(
            "  → {:?} {:.2} {} @ {:.5} (SL {:.5}, TP {:.5})",
            order.direction,
            order.volume,
            symbol,
            order.price,
            order.stop_loss,
            order.take_profit
        );

        match broker.submit_order(&order) {
            Ok(receipt) => {
                tracing::info!(
                    "  ✓ Filled ticket {} @ {:.5}",
                    receipt.ticket,
                    receipt.fill_price
                );
                EntryOutcome::Filled { order, receipt }
            }
            Err(error) => {
                tracing::error!("  ✗ Order rejected: {}", error);
                EntryOutcome::Rejected { order, error }
            }
        }
    }
}

fn describe(action: &PositionAction) -> String {
    match action {
        PositionAction::MoveStopLoss(req) => {
            format!("{:?} stop -> {:.5}", req.reason, req.new_stop_loss)
        }
        PositionAction::Close(req) => format!("close ({:?})", req.reason),
    }
}
