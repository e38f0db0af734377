use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::{Account, SymbolInfo};
use crate::Result;

/// Per-trade risk parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskConfig {
    /// Share of balance risked per trade, in percent
    pub risk_percent: f64,
    /// Stop-loss distance in ATRs
    pub sl_atr_multiplier: f64,
    /// Take-profit distance in ATRs
    pub tp_atr_multiplier: f64,
    /// Max spread in points before an entry is declined
    pub max_spread_points: f64,
    /// Lot used when sizing inputs are missing or degenerate
    pub fallback_lot: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_percent: 1.0,
            sl_atr_multiplier: 1.5,
            tp_atr_multiplier: 2.0,
            max_spread_points: 60.0,
            fallback_lot: 0.01,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("risk_percent", self.risk_percent),
            ("sl_atr_multiplier", self.sl_atr_multiplier),
            ("tp_atr_multiplier", self.tp_atr_multiplier),
            ("max_spread_points", self.max_spread_points),
            ("fallback_lot", self.fallback_lot),
        ];

        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "risk.{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        if self.risk_percent > 100.0 {
            return Err(EngineError::InvalidConfig(format!(
                "risk.risk_percent must not exceed 100, got {}",
                self.risk_percent
            )));
        }

        Ok(())
    }
}

/// Converts an account risk budget and ATR volatility into a lot size
#[derive(Debug, Clone)]
pub struct RiskSizer {
    config: RiskConfig,
}

impl RiskSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Lot size that loses `risk_percent` of balance if the ATR stop is hit
    ///
    /// `lot = risk / (sl_distance / tick_size * tick_value)`, rounded to two
    /// decimals and then clamped to the broker minimum. Missing account or
    /// symbol info, zero tick value/size or an unusable ATR fall back to
    /// `fallback_lot` (raised to the broker minimum when it is known). The
    /// result is always finite and positive.
    pub fn lot_size(
        &self,
        account: Option<&Account>,
        symbol: Option<&SymbolInfo>,
        atr: f64,
    ) -> f64 {
        let Some(symbol) = symbol else {
            return self.config.fallback_lot;
        };

        let volume_min = if symbol.volume_min.is_finite() && symbol.volume_min > 0.0 {
            symbol.volume_min
        } else {
            self.config.fallback_lot
        };
        let fallback = self.config.fallback_lot.max(volume_min);

        let Some(account) = account else {
            return fallback;
        };

        if !is_positive(symbol.tick_value) || !is_positive(symbol.tick_size) || !is_positive(atr)
        {
            return fallback;
        }

        let risk_amount = account.balance * (self.config.risk_percent / 100.0);
        let sl_distance = atr * self.config.sl_atr_multiplier;
        let lot = risk_amount / (sl_distance / symbol.tick_size * symbol.tick_value);

        if !lot.is_finite() {
            return fallback;
        }

        round_lot(lot).max(volume_min)
    }
}

impl Default for RiskSizer {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Round to the two-decimal lot step
fn round_lot(lot: f64) -> f64 {
    (lot * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gold() -> SymbolInfo {
        SymbolInfo {
            tick_value: 1.0,
            tick_size: 0.01,
            point: 0.01,
            volume_min: 0.01,
        }
    }

    fn account(balance: f64) -> Account {
        Account { balance }
    }

    #[test]
    fn test_reference_sizing() {
        // risk 100, sl distance 3.0 -> 100 / 300 = 0.333
        let sizer = RiskSizer::default();
        let lot = sizer.lot_size(Some(&account(10_000.0)), Some(&gold()), 2.0);
        assert_relative_eq!(lot, 0.33);
    }

    #[test]
    fn test_rounds_to_nearest_step() {
        let sizer = RiskSizer::default();
        // 100 / (1.0 * 1.5 / 0.01) = 0.6667
        let lot = sizer.lot_size(Some(&account(10_000.0)), Some(&gold()), 1.0);
        assert_relative_eq!(lot, 0.67);
    }

    #[test]
    fn test_clamps_to_volume_min() {
        let sizer = RiskSizer::default();
        let symbol = SymbolInfo {
            volume_min: 0.1,
            ..gold()
        };
        // 10 / 300 = 0.033 -> 0.03 -> clamped to 0.1
        let lot = sizer.lot_size(Some(&account(1_000.0)), Some(&symbol), 2.0);
        assert_relative_eq!(lot, 0.1);
    }

    #[test]
    fn test_tiny_lot_never_rounds_to_zero() {
        let sizer = RiskSizer::default();
        let lot = sizer.lot_size(Some(&account(10.0)), Some(&gold()), 50.0);
        assert_relative_eq!(lot, 0.01);
    }

    #[test]
    fn test_missing_info_falls_back() {
        let sizer = RiskSizer::default();
        assert_eq!(sizer.lot_size(None, Some(&gold()), 2.0), 0.01);
        assert_eq!(sizer.lot_size(Some(&account(10_000.0)), None, 2.0), 0.01);
        assert_eq!(sizer.lot_size(None, None, 2.0), 0.01);
    }

    #[test]
    fn test_degenerate_symbol_falls_back() {
        let sizer = RiskSizer::default();
        let zero_tick_value = SymbolInfo {
            tick_value: 0.0,
            ..gold()
        };
        let zero_tick_size = SymbolInfo {
            tick_size: 0.0,
            ..gold()
        };

        assert_eq!(
            sizer.lot_size(Some(&account(10_000.0)), Some(&zero_tick_value), 2.0),
            0.01
        );
        assert_eq!(
            sizer.lot_size(Some(&account(10_000.0)), Some(&zero_tick_size), 2.0),
            0.01
        );
    }

    #[test]
    fn test_unusable_atr_falls_back() {
        let sizer = RiskSizer::default();
        for atr in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let lot = sizer.lot_size(Some(&account(10_000.0)), Some(&gold()), atr);
            assert_eq!(lot, 0.01, "atr {}", atr);
        }
    }

    #[test]
    fn test_negative_balance_clamps_to_minimum() {
        let sizer = RiskSizer::default();
        let lot = sizer.lot_size(Some(&account(-500.0)), Some(&gold()), 2.0);
        assert_eq!(lot, 0.01);
    }

    #[test]
    fn test_config_validation() {
        assert!(RiskConfig::default().validate().is_ok());

        let bad = RiskConfig {
            sl_atr_multiplier: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = RiskConfig {
            risk_percent: 150.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
