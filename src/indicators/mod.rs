// Technical indicators module
// Implements EMA, Wilder RSI and ATR plus the per-window indicator engine

pub mod atr;
pub mod engine;
pub mod moving_average;
pub mod rsi;

pub use atr::{atr_series, calculate_atr, true_range_series};
pub use engine::{IndicatorConfig, IndicatorEngine, IndicatorSnapshot};
pub use moving_average::{calculate_ema, calculate_sma, ema_series};
pub use rsi::{calculate_rsi, rsi_series};
