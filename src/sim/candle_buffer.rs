use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use crate::models::{Candle, Timeframe};

/// Rolling window of one-minute candles, aggregated on demand
///
/// Higher timeframes are built by bucketing minutes on timeframe boundaries,
/// so the last bar of an aggregated window is the one still forming.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    candles: VecDeque<Candle>,
    max_candles: usize,
}

impl CandleBuffer {
    /// Create a new candle buffer
    ///
    /// # Arguments
    /// * `max_candles` - Maximum number of one-minute candles to keep
    pub fn new(max_candles: usize) -> Self {
        Self {
            candles: VecDeque::with_capacity(max_candles),
            max_candles,
        }
    }

    /// Add a candle, removing the oldest one if the buffer is full
    pub fn add_candle(&mut self, candle: Candle) {
        self.candles.push_back(candle);

        while self.candles.len() > self.max_candles {
            self.candles.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Get the N most recent candles of `timeframe`
    pub fn get_recent_candles(&self, timeframe: Timeframe, n: usize) -> Vec<Candle> {
        let bars = self.aggregate(timeframe);
        let skip = bars.len().saturating_sub(n);
        bars.into_iter().skip(skip).collect()
    }

    fn aggregate(&self, timeframe: Timeframe) -> Vec<Candle> {
        let bucket_secs = timeframe.minutes() * 60;
        let mut bars: Vec<Candle> = Vec::new();
        let mut current_bucket: Option<i64> = None;

        for candle in &self.candles {
            let secs = candle.time.timestamp();
            let bucket = secs - secs.rem_euclid(bucket_secs);

            match bars.last_mut() {
                Some(bar) if current_bucket == Some(bucket) => {
                    bar.high = bar.high.max(candle.high);
                    bar.low = bar.low.min(candle.low);
                    bar.close = candle.close;
                }
                _ => {
                    current_bucket = Some(bucket);
                    bars.push(Candle {
                        time: bucket_start(bucket).unwrap_or(candle.time),
                        ..candle.clone()
                    });
                }
            }
        }

        bars
    }
}

fn bucket_start(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}
