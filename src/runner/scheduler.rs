use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::Result;

/// UTC hours (inclusive) during which new entries are allowed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl SessionWindow {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let hour = now.hour();
        if self.start_hour <= self.end_hour {
            self.start_hour <= hour && hour <= self.end_hour
        } else {
            // Wraps midnight, e.g. 22..=3
            hour >= self.start_hour || hour <= self.end_hour
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Delay between ordinary cycles
    pub scan_interval_secs: u64,
    /// No new entries for this long after a signal
    pub cooldown_secs: u64,
    /// Delay after a cycle in which market data could not be read
    pub error_backoff_secs: u64,
    /// Restrict new entries to a UTC session (London/NY: 8..=20)
    pub session: Option<SessionWindow>,
    /// Skip new entries while any position is open
    pub single_position: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 10,
            cooldown_secs: 300,
            error_backoff_secs: 10,
            session: None,
            single_position: false,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "scheduler.scan_interval_secs must be at least 1".to_string(),
            ));
        }

        // A zero backoff turns a failing broker into a busy loop
        if self.error_backoff_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "scheduler.error_backoff_secs must be at least 1".to_string(),
            ));
        }

        if let Some(session) = self.session {
            if session.start_hour > 23 || session.end_hour > 23 {
                return Err(EngineError::InvalidConfig(format!(
                    "scheduler.session hours must be within 0..=23, got {}..={}",
                    session.start_hour, session.end_hour
                )));
            }
        }

        Ok(())
    }
}

/// Entry gate between cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Scanning for entries
    Idle,
    /// A directional signal was seen this cycle; the entry attempt is pending
    Signaled { at: DateTime<Utc> },
    /// Entry attempted; no new entries until `until`
    Cooldown { until: DateTime<Utc> },
}

/// Keeps the "don't enter twice on the same candle" rule out of the engine core.
///
/// Idle -> Signaled -> Cooldown -> Idle. Position management is never gated;
/// only new entries are.
#[derive(Debug, Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    state: SchedulerState,
    last_cycle_failed: bool,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: SchedulerState::Idle,
            last_cycle_failed: false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Expire a finished cooldown, then report why entries are blocked, if they are
    pub fn entry_block(&mut self, now: DateTime<Utc>) -> Option<String> {
        if let SchedulerState::Cooldown { until } = self.state {
            if now >= until {
                tracing::debug!("Cooldown over, scanning for entries");
                self.state = SchedulerState::Idle;
            }
        }

        match self.state {
            SchedulerState::Cooldown { until } => {
                Some(format!("cooling down until {}", until.format("%H:%M:%S")))
            }
            SchedulerState::Signaled { .. } => Some("entry already pending".to_string()),
            SchedulerState::Idle => match self.config.session {
                Some(session) if !session.contains(now) => {
                    Some("outside trading session".to_string())
                }
                _ => None,
            },
        }
    }

    pub fn on_signal(&mut self, now: DateTime<Utc>) {
        if self.state == SchedulerState::Idle {
            self.state = SchedulerState::Signaled { at: now };
        }
    }

    /// The entry for the pending signal was sent, declined or rejected
    pub fn on_entry_attempted(&mut self, now: DateTime<Utc>) {
        if let SchedulerState::Signaled { .. } = self.state {
            let until = now + Duration::seconds(self.config.cooldown_secs as i64);
            self.state = SchedulerState::Cooldown { until };
        }
    }

    pub fn record_cycle(&mut self, failed: bool) {
        self.last_cycle_failed = failed;
    }

    /// How long to wait before the next cycle
    pub fn next_delay(&self) -> std::time::Duration {
        let secs = if self.last_cycle_failed {
            self.config.error_backoff_secs
        } else {
            self.config.scan_interval_secs
        };
        std::time::Duration::from_secs(secs)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
