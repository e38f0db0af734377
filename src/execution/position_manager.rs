use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::{
    ClosePositionRequest, CloseReason, Position, PositionAction, Side, StopLossUpdateRequest,
    StopReason, Tick,
};
use crate::Result;

/// Stop-loss management parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagementConfig {
    /// Favorable move, in ATRs, that arms the break-even stop
    pub break_even_atr_multiplier: f64,
    /// Trailing distance from market price, in ATRs
    pub trailing_atr_multiplier: f64,
    /// Break-even stop offset beyond the entry, in points
    pub break_even_buffer_points: f64,
    /// Force-close after this many minutes; disabled when unset
    pub max_holding_minutes: Option<u64>,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            break_even_atr_multiplier: 1.0,
            trailing_atr_multiplier: 1.0,
            break_even_buffer_points: 10.0,
            max_holding_minutes: None,
        }
    }
}

impl ManagementConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("break_even_atr_multiplier", self.break_even_atr_multiplier),
            ("trailing_atr_multiplier", self.trailing_atr_multiplier),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "management.{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        if !(self.break_even_buffer_points.is_finite() && self.break_even_buffer_points >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "management.break_even_buffer_points must be non-negative, got {}",
                self.break_even_buffer_points
            )));
        }

        if self.max_holding_minutes == Some(0) {
            return Err(EngineError::InvalidConfig(
                "management.max_holding_minutes must be at least 1 when set".to_string(),
            ));
        }

        Ok(())
    }
}

/// Advances open positions' stop-loss through break-even and trailing.
///
/// Holds no per-position state. Whether a position is already at break-even
/// is read off its live stop-loss on every call, so proposals only ever
/// tighten the stop and repeated calls at an unchanged price are no-ops.
#[derive(Debug, Clone)]
pub struct PositionManager {
    config: ManagementConfig,
}

impl PositionManager {
    pub fn new(config: ManagementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ManagementConfig {
        &self.config
    }

    /// Decide what, if anything, to do with one open position
    ///
    /// # Arguments
    /// * `point` - Symbol point size, used for the break-even buffer
    /// * `atr` - Latest closed entry-timeframe ATR
    /// * `now` - Current time, only used by the max-holding rule
    pub fn evaluate(
        &self,
        position: &Position,
        tick: &Tick,
        point: f64,
        atr: f64,
        now: DateTime<Utc>,
    ) -> Option<PositionAction> {
        if let Some(minutes) = self.config.max_holding_minutes {
            if now - position.open_time >= Duration::minutes(minutes as i64) {
                return Some(PositionAction::Close(ClosePositionRequest {
                    ticket: position.ticket,
                    reason: CloseReason::MaxHoldingTime,
                }));
            }
        }

        if !(atr.is_finite() && atr > 0.0) {
            tracing::debug!("Skipping position {}: no usable ATR ({})", position.ticket, atr);
            return None;
        }

        let price = position.market_price(tick);

        if !position.is_at_break_even() {
            return self.break_even(position, price, point, atr);
        }

        self.trailing(position, price, atr)
    }

    /// Evaluate every position, keeping only those with something to do
    pub fn evaluate_all(
        &self,
        positions: &[Position],
        tick: &Tick,
        point: f64,
        atr: f64,
        now: DateTime<Utc>,
    ) -> Vec<PositionAction> {
        positions
            .iter()
            .filter_map(|p| self.evaluate(p, tick, point, atr, now))
            .collect()
    }

    fn break_even(
        &self,
        position: &Position,
        price: f64,
        point: f64,
        atr: f64,
    ) -> Option<PositionAction> {
        let trigger = atr * self.config.break_even_atr_multiplier;
        if position.favorable_distance(price) < trigger {
            return None;
        }

        let buffer = if point.is_finite() && point > 0.0 {
            point * self.config.break_even_buffer_points
        } else {
            0.0
        };

        let new_sl = match position.side {
            Side::Long => position.open_price + buffer,
            Side::Short => position.open_price - buffer,
        };

        // A stop at or through the market would be rejected by the broker
        let below_market = match position.side {
            Side::Long => new_sl < price,
            Side::Short => new_sl > price,
        };
        if !below_market || !position.tightens_stop(new_sl) {
            return None;
        }

        tracing::debug!(
            "Position {} armed break-even: {:?} -> {:.5}",
            position.ticket,
            position.stop_loss,
            new_sl
        );

        Some(self.move_stop(position, new_sl, StopReason::BreakEven))
    }

    fn trailing(&self, position: &Position, price: f64, atr: f64) -> Option<PositionAction> {
        let trail_distance = atr * self.config.trailing_atr_multiplier;
        let candidate = match position.side {
            Side::Long => price - trail_distance,
            Side::Short => price + trail_distance,
        };

        if !position.tightens_stop(candidate) {
            return None;
        }

        tracing::debug!(
            "Position {} trailing stop: {:?} -> {:.5}",
            position.ticket,
            position.stop_loss,
            candidate
        );

        Some(self.move_stop(position, candidate, StopReason::Trailing))
    }

    fn move_stop(&self, position: &Position, new_sl: f64, reason: StopReason) -> PositionAction {
        PositionAction::MoveStopLoss(StopLossUpdateRequest {
            ticket: position.ticket,
            new_stop_loss: new_sl,
            take_profit: position.take_profit,
            reason,
        })
    }
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new(ManagementConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    const POINT: f64 = 0.01;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap()
    }

    fn position(side: Side, open_price: f64, stop_loss: Option<f64>) -> Position {
        Position {
            ticket: 7,
            side,
            open_price,
            stop_loss,
            take_profit: Some(match side {
                Side::Long => open_price + 4.0,
                Side::Short => open_price - 4.0,
            }),
            open_time: now() - Duration::minutes(10),
        }
    }

    fn tick(price: f64) -> Tick {
        Tick {
            bid: price,
            ask: price + 0.2,
        }
    }

    fn stop_update(action: Option<PositionAction>) -> StopLossUpdateRequest {
        match action {
            Some(PositionAction::MoveStopLoss(req)) => req,
            other => panic!("expected stop update, got {:?}", other),
        }
    }

    /// Apply a proposal the way the broker would
    fn apply(position: &mut Position, action: &Option<PositionAction>) {
        if let Some(PositionAction::MoveStopLoss(req)) = action {
            position.stop_loss = Some(req.new_stop_loss);
        }
    }

    #[test]
    fn test_long_break_even() {
        let pm = PositionManager::default();
        let pos = position(Side::Long, 100.0, Some(97.0));

        // Bid moved 2.5 in favour, ATR 2.0 -> armed
        let req = stop_update(pm.evaluate(&pos, &tick(102.5), POINT, 2.0, now()));
        assert_eq!(req.ticket, 7);
        assert_eq!(req.reason, StopReason::BreakEven);
        assert_relative_eq!(req.new_stop_loss, 100.1, epsilon = 1e-9); // 10 points
        assert_eq!(req.take_profit, Some(104.0));
    }

    #[test]
    fn test_short_break_even_uses_ask() {
        let pm = PositionManager::default();
        let pos = position(Side::Short, 100.0, Some(103.0));

        // Bid 97.9 but ask 98.1 -> favorable 1.9 < 2.0
        assert!(pm.evaluate(&pos, &tick(97.9), POINT, 2.0, now()).is_none());

        let req = stop_update(pm.evaluate(&pos, &tick(97.7), POINT, 2.0, now()));
        assert_eq!(req.reason, StopReason::BreakEven);
        assert_relative_eq!(req.new_stop_loss, 99.9, epsilon = 1e-9);
        assert_eq!(req.take_profit, Some(96.0));
    }

    #[test]
    fn test_not_triggered_below_threshold() {
        let pm = PositionManager::default();
        let pos = position(Side::Long, 100.0, Some(97.0));

        assert!(pm.evaluate(&pos, &tick(101.5), POINT, 2.0, now()).is_none());
    }

    #[test]
    fn test_adverse_move_does_not_arm_break_even() {
        let pm = PositionManager::default();
        let pos = position(Side::Long, 100.0, Some(96.0));

        // 3.0 against the position is not a favorable distance
        assert!(pm.evaluate(&pos, &tick(97.0), POINT, 2.0, now()).is_none());
    }

    #[test]
    fn test_break_even_is_idempotent() {
        let pm = PositionManager::default();
        let mut pos = position(Side::Long, 100.0, Some(97.0));
        let price = tick(102.05);

        let first = pm.evaluate(&pos, &price, POINT, 2.0, now());
        assert_eq!(stop_update(first.clone()).reason, StopReason::BreakEven);
        apply(&mut pos, &first);

        // Same price again: at break-even now, trailing candidate 100.05 < 100.1
        assert!(pm.evaluate(&pos, &price, POINT, 2.0, now()).is_none());
        assert!(pm.evaluate(&pos, &price, POINT, 2.0, now()).is_none());
    }

    #[test]
    fn test_trailing_after_break_even() {
        let pm = PositionManager::default();
        let pos = position(Side::Long, 100.0, Some(100.1));

        let req = stop_update(pm.evaluate(&pos, &tick(105.0), POINT, 2.0, now()));
        assert_eq!(req.reason, StopReason::Trailing);
        assert_relative_eq!(req.new_stop_loss, 103.0, epsilon = 1e-9);
        assert_eq!(req.take_profit, Some(104.0));
    }

    #[test]
    fn test_trailing_never_loosens() {
        let pm = PositionManager::default();
        let pos = position(Side::Long, 100.0, Some(103.0));

        // Pullback: candidate 102.0 is below current stop
        assert!(pm.evaluate(&pos, &tick(104.0), POINT, 2.0, now()).is_none());

        let short = position(Side::Short, 100.0, Some(97.0));
        // Ask 96.2 -> candidate 98.2 above current stop
        assert!(pm.evaluate(&short, &tick(96.0), POINT, 2.0, now()).is_none());
    }

    #[test]
    fn test_short_trailing() {
        let pm = PositionManager::default();
        let pos = position(Side::Short, 100.0, Some(99.9));

        let req = stop_update(pm.evaluate(&pos, &tick(94.8), POINT, 2.0, now()));
        assert_eq!(req.reason, StopReason::Trailing);
        assert_relative_eq!(req.new_stop_loss, 97.0, epsilon = 1e-9);
    }

    #[test]
    fn test_trailing_waits_for_break_even() {
        let config = ManagementConfig {
            break_even_atr_multiplier: 3.0,
            ..Default::default()
        };
        let pm = PositionManager::new(config);
        let pos = position(Side::Long, 100.0, Some(97.0));

        // Favorable 5.0 < 6.0 trigger: no trailing even though 103.0 > 97.0
        assert!(pm.evaluate(&pos, &tick(105.0), POINT, 2.0, now()).is_none());
    }

    #[test]
    fn test_position_without_stop_gets_break_even() {
        let pm = PositionManager::default();
        let pos = position(Side::Short, 100.0, None);

        let req = stop_update(pm.evaluate(&pos, &tick(97.0), POINT, 2.0, now()));
        assert_eq!(req.reason, StopReason::BreakEven);
        assert_relative_eq!(req.new_stop_loss, 99.9, epsilon = 1e-9);
    }

    #[test]
    fn test_break_even_never_placed_through_market() {
        let config = ManagementConfig {
            break_even_atr_multiplier: 0.01,
            break_even_buffer_points: 500.0,
            ..Default::default()
        };
        let pm = PositionManager::new(config);
        let pos = position(Side::Long, 100.0, Some(97.0));

        // Buffer 5.0 would put the stop at 105.0, above the 101.0 bid
        assert!(pm.evaluate(&pos, &tick(101.0), POINT, 2.0, now()).is_none());
    }

    #[test]
    fn test_unusable_atr_skips_position() {
        let pm = PositionManager::default();
        let pos = position(Side::Long, 100.0, Some(97.0));

        for atr in [0.0, -1.0, f64::NAN] {
            assert!(pm.evaluate(&pos, &tick(110.0), POINT, atr, now()).is_none());
        }
    }

    #[test]
    fn test_max_holding_time_closes() {
        let config = ManagementConfig {
            max_holding_minutes: Some(30),
            ..Default::default()
        };
        let pm = PositionManager::new(config);
        let mut pos = position(Side::Long, 100.0, Some(97.0));

        // 10 minutes old: normal management
        assert!(pm.evaluate(&pos, &tick(100.5), POINT, 2.0, now()).is_none());

        pos.open_time = now() - Duration::minutes(30);
        let action = pm.evaluate(&pos, &tick(100.5), POINT, 2.0, now());
        assert_eq!(
            action,
            Some(PositionAction::Close(ClosePositionRequest {
                ticket: 7,
                reason: CloseReason::MaxHoldingTime,
            }))
        );
    }

    #[test]
    fn test_max_holding_disabled_by_default() {
        let pm = PositionManager::default();
        let mut pos = position(Side::Long, 100.0, Some(97.0));
        pos.open_time = now() - Duration::days(3);

        assert!(pm.evaluate(&pos, &tick(100.5), POINT, 2.0, now()).is_none());
    }

    #[test]
    fn test_evaluate_all() {
        let pm = PositionManager::default();
        let mut quiet = position(Side::Long, 104.0, Some(101.0));
        quiet.ticket = 1;
        let mut winner = position(Side::Long, 100.0, Some(97.0));
        winner.ticket = 2;

        let actions = pm.evaluate_all(&[quiet, winner], &tick(102.5), POINT, 2.0, now());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].ticket(), 2);
    }

    #[test]
    fn test_config_validation() {
        assert!(ManagementConfig::default().validate().is_ok());

        let bad = ManagementConfig {
            trailing_atr_multiplier: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = ManagementConfig {
            max_holding_minutes: Some(0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
