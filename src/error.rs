/// Errors and declines reported by the decision engine.
///
/// Only `MalformedCandle`, `InvalidConfig` and `Config` indicate a bug or a
/// bad deployment; the rest describe a cycle in which nothing was done.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("insufficient data: have {have} candles, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("missing market info: {0}")]
    MissingMarketInfo(String),

    #[error("spread too wide: {spread_points:.1} points (max {max_points:.1})")]
    SpreadTooWide { spread_points: f64, max_points: f64 },

    #[error("execution rejected: {0}")]
    ExecutionRejected(String),

    #[error("no actionable signal")]
    NoSignal,

    #[error("malformed candle at index {index}")]
    MalformedCandle { index: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl EngineError {
    /// Whether the error only means "skip this cycle"
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientData { .. }
                | EngineError::MissingMarketInfo(_)
                | EngineError::SpreadTooWide { .. }
                | EngineError::ExecutionRejected(_)
                | EngineError::NoSignal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::InsufficientData { have: 12, need: 100 };
        assert_eq!(err.to_string(), "insufficient data: have 12 candles, need 100");

        let err = EngineError::SpreadTooWide {
            spread_points: 75.0,
            max_points: 60.0,
        };
        assert_eq!(err.to_string(), "spread too wide: 75.0 points (max 60.0)");
    }

    #[test]
    fn test_transient_classification() {
        assert!(EngineError::NoSignal.is_transient());
        assert!(EngineError::MissingMarketInfo("tick".into()).is_transient());
        assert!(!EngineError::MalformedCandle { index: 3 }.is_transient());
        assert!(!EngineError::InvalidConfig("lookback".into()).is_transient());
    }
}
