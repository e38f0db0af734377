use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EngineError;
use crate::execution::ManagementConfig;
use crate::indicators::IndicatorConfig;
use crate::models::Timeframe;
use crate::risk::RiskConfig;
use crate::runner::SchedulerConfig;
use crate::sim::PaperConfig;
use crate::strategy::SignalConfig;
use crate::Result;

/// Prefix for environment overrides, e.g. `TRENDBOT__RISK__RISK_PERCENT=0.5`
pub const ENV_PREFIX: &str = "TRENDBOT";

/// Traded instrument and the two timeframes it is evaluated on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub entry_timeframe: Timeframe,
    pub trend_timeframe: Timeframe,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            symbol: "XAUUSD".to_string(),
            entry_timeframe: Timeframe::M5,
            trend_timeframe: Timeframe::M15,
        }
    }
}

/// Complete bot configuration
///
/// Immutable once loaded; each component receives its own section at
/// construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub instrument: InstrumentConfig,
    pub indicators: IndicatorConfig,
    pub signal: SignalConfig,
    pub risk: RiskConfig,
    pub management: ManagementConfig,
    pub scheduler: SchedulerConfig,
    pub paper: PaperConfig,
}

impl Settings {
    /// Load settings: defaults, then an optional TOML file, then environment
    ///
    /// # Example
    /// ```
    /// use trendbot::config::Settings;
    ///
    /// let settings = Settings::load(None).unwrap();
    /// assert_eq!(settings.indicators.lookback, 100);
    /// ```
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values no strategy instance can run with
    pub fn validate(&self) -> Result<()> {
        if self.instrument.symbol.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "instrument.symbol must not be empty".to_string(),
            ));
        }

        if self.instrument.entry_timeframe.minutes() >= self.instrument.trend_timeframe.minutes()
        {
            return Err(EngineError::InvalidConfig(format!(
                "trend timeframe {:?} must be slower than entry timeframe {:?}",
                self.instrument.trend_timeframe, self.instrument.entry_timeframe
            )));
        }

        let ind = &self.indicators;
        for (name, value) in [
            ("ema_fast_span", ind.ema_fast_span),
            ("ema_slow_span", ind.ema_slow_span),
            ("rsi_period", ind.rsi_period),
            ("atr_period", ind.atr_period),
        ] {
            if value == 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "indicators.{} must be at least 1",
                    name
                )));
            }
        }

        if ind.ema_fast_span >= ind.ema_slow_span {
            return Err(EngineError::InvalidConfig(format!(
                "indicators.ema_fast_span ({}) must be shorter than ema_slow_span ({})",
                ind.ema_fast_span, ind.ema_slow_span
            )));
        }

        // The closed candle sits at lookback - 2 and needs defined RSI and ATR
        let warm_up = ind.rsi_period.max(ind.atr_period);
        if ind.lookback <= warm_up {
            return Err(EngineError::InvalidConfig(format!(
                "indicators.lookback ({}) must exceed the longest warm-up ({})",
                ind.lookback, warm_up
            )));
        }

        self.signal.validate()?;
        self.risk.validate()?;
        self.management.validate()?;
        self.scheduler.validate()?;

        Ok(())
    }
}
