use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::models::Candle;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise
    Uptrend,
    /// Steady downtrend with noise
    Downtrend,
    /// Mean-reverting chop around the base price
    Sideways,
    /// Large swings, no drift
    Volatile,
    /// Trend direction flips every `ALTERNATE_EVERY` candles
    Alternating,
}

const ALTERNATE_EVERY: usize = 720;
const TREND_DRIFT: f64 = 0.00003;

/// Generates a reproducible stream of one-minute candles
///
/// Each candle opens at the previous close, so windows aggregated to higher
/// timeframes stay gap-free.
pub struct SyntheticCandleGenerator {
    rng: StdRng,
    scenario: MarketScenario,
    base_price: f64,
    price: f64,
    step: usize,
}

impl SyntheticCandleGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64, scenario: MarketScenario, base_price: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            scenario,
            base_price,
            price: base_price,
            step: 0,
        }
    }

    pub fn scenario(&self) -> MarketScenario {
        self.scenario
    }

    /// Generate `num_candles` consecutive candles starting at `start_time`
    pub fn generate(
        &mut self,
        start_time: DateTime<Utc>,
        num_candles: usize,
        interval_minutes: i64,
    ) -> Vec<Candle> {
        (0..num_candles)
            .map(|i| {
                let time = start_time + Duration::minutes(i as i64 * interval_minutes);
                self.next_candle(time)
            })
            .collect()
    }

    /// Advance the walk by one candle stamped `time`
    pub fn next_candle(&mut self, time: DateTime<Utc>) -> Candle {
        let open = self.price;
        let change = match self.scenario {
            MarketScenario::Uptrend => self.trend_step(1.0),
            MarketScenario::Downtrend => self.trend_step(-1.0),
            MarketScenario::Alternating => {
                let sign = if (self.step / ALTERNATE_EVERY) % 2 == 0 {
                    1.0
                } else {
                    -1.0
                };
                self.trend_step(sign)
            }
            MarketScenario::Sideways => {
                // Mean reversion force + noise
                let reversion = (self.base_price - self.price) * 0.05;
                reversion + self.price * self.rng.gen_range(-0.0005..0.0005)
            }
            MarketScenario::Volatile => self.price * self.rng.gen_range(-0.004..0.004),
        };

        // Prevent price from going too low
        self.price = (self.price + change).max(self.base_price * 0.2);
        self.step += 1;

        self.create_candle(time, open, self.price)
    }

    fn trend_step(&mut self, sign: f64) -> f64 {
        let drift = self.price * TREND_DRIFT * sign;
        let noise = self.price * self.rng.gen_range(-0.0004..0.0004);
        drift + noise
    }

    fn create_candle(&mut self, time: DateTime<Utc>, open: f64, close: f64) -> Candle {
        // ±0.03% intrabar extension beyond the body
        let wick = 0.0003;
        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..wick));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..wick));

        Candle {
            time,
            open,
            high,
            low,
            close,
        }
    }
}
