//! # engine::exit
//!
//! **Position Exit Evaluator** — runs once per exit tick against the open
//! position.
//!
//! ```text
//! hold_periods += 1
//!     │
//!     ├─ [1] Fixed stop     long:  P ≥ TP → fixed_tp | P ≤ SL → fixed_sl
//!     │                     short: P ≤ TP → fixed_tp | P ≥ SL → fixed_sl
//!     │
//!     ├─ [2] Forced         hold ≥ 10 → forced
//!     │
//!     └─ [3] Golden
//!            short: (V > 1.0 || hold ≥ 5) && (ΔT ≤ -14% || pnl ≥ 2%)
//!            long:  (V > 1.0 || hold ≥ 7) && (Δ|T| < 0  || pnl ≥ 2%)
//! ```

use serde::Serialize;
use tracing::debug;

use crate::config::{ensure, env_f64, env_or, ConfigError};
use crate::models::{Direction, ExitKind, IndicatorSnapshot, Position};

/// Relative tolerance when comparing a price against a stored TP/SL level,
/// so `100 × 1.05` still triggers at a quoted `105.0`.
const PRICE_TOLERANCE: f64 = 1e-9;

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExitConfig {
    /// Fixed take-profit distance as a fraction of entry (`0.05` = 5%).
    pub take_profit: f64,
    /// Fixed stop-loss distance as a fraction of entry (`0.025` = 2.5%).
    pub stop_loss: f64,

    /// Volume ratio above which the move is considered exhausted.
    pub volume_expand: f64,
    pub short_min_hold: u32,
    pub long_min_hold: u32,
    /// Short exits once tension has dropped by this many percent.
    pub short_tension_drop: f64,
    /// Either side exits once PnL reaches this many percent.
    pub profit_target: f64,
    /// Unconditional exit after this many exit ticks.
    pub max_hold: u32,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            take_profit:        0.05,
            stop_loss:          0.025,
            volume_expand:      1.0,
            short_min_hold:     5,
            long_min_hold:      7,
            short_tension_drop: 14.0,
            profit_target:      2.0,
            max_hold:           10,
        }
    }
}

impl ExitConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            take_profit:        env_f64("ENGINE_TAKE_PROFIT", d.take_profit)?,
            stop_loss:          env_f64("ENGINE_STOP_LOSS", d.stop_loss)?,
            volume_expand:      env_f64("ENGINE_EXIT_VOLUME_EXPAND", d.volume_expand)?,
            short_min_hold:     env_or("ENGINE_SHORT_EXIT_MIN_HOLD", d.short_min_hold)?,
            long_min_hold:      env_or("ENGINE_LONG_EXIT_MIN_HOLD", d.long_min_hold)?,
            short_tension_drop: env_f64("ENGINE_SHORT_EXIT_TENSION_DROP", d.short_tension_drop)?,
            profit_target:      env_f64("ENGINE_EXIT_PROFIT_TARGET", d.profit_target)?,
            max_hold:           env_or("ENGINE_MAX_HOLD_PERIODS", d.max_hold)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.take_profit > 0.0 && self.take_profit < 1.0, "take profit must be in (0, 1)")?;
        ensure(self.stop_loss > 0.0 && self.stop_loss < 1.0, "stop loss must be in (0, 1)")?;
        ensure(self.short_tension_drop > 0.0, "short tension drop must be positive")?;
        ensure(self.profit_target > 0.0, "profit target must be positive")?;
        ensure(self.max_hold >= 1, "max hold periods must be at least 1")
    }
}

// ─── Result ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExitOutcome {
    Held,
    Exited { kind: ExitKind, reason: String, pnl_pct: f64 },
}

// ─── Evaluate ─────────────────────────────────────────────────────────────────

/// Advances `position` by one tick and decides whether to close it.
///
/// The caller owns the position; on `Exited` it must drop it from the store.
pub fn evaluate_exit(
    position: &mut Position,
    current:  &IndicatorSnapshot,
    config:   &ExitConfig,
) -> ExitOutcome {
    position.hold_periods = position.hold_periods.saturating_add(1);
    let hold  = position.hold_periods;
    let price = current.price;
    let pnl   = position.pnl_pct(price);

    // ── [1] Fixed stop ────────────────────────────────────────────────────────
    if let Some(outcome) = check_fixed_stop(position, current) {
        return outcome;
    }

    // ── [2] Forced ────────────────────────────────────────────────────────────
    if hold >= config.max_hold {
        return ExitOutcome::Exited {
            kind:    ExitKind::Forced,
            reason:  format!("forced: max hold periods ({hold})"),
            pnl_pct: pnl,
        };
    }

    // ── [3] Golden ────────────────────────────────────────────────────────────
    let tension_change = position.direction.tension_change(current.tension, position.entry_tension);
    let volume_expanded = current.volume_ratio > config.volume_expand;
    let profit_hit      = pnl >= config.profit_target;

    let (held_long_enough, tension_shift) = match position.direction {
        Direction::Short => (
            hold >= config.short_min_hold,
            tension_change <= -config.short_tension_drop,
        ),
        Direction::Long => (hold >= config.long_min_hold, tension_change < 0.0),
    };

    let should_exit = (volume_expanded || held_long_enough) && (tension_shift || profit_hit);

    debug!(
        position_id = %position.id,
        direction   = %position.direction,
        hold,
        pnl,
        tension_change,
        volume      = current.volume_ratio,
        should_exit,
        "exit evaluated"
    );

    if !should_exit {
        return ExitOutcome::Held;
    }

    let mut reasons = Vec::with_capacity(4);
    if volume_expanded {
        reasons.push(format!("volume expansion ({:.2})", current.volume_ratio));
    }
    if held_long_enough {
        reasons.push(format!("held {hold} periods"));
    }
    if tension_shift {
        reasons.push(match position.direction {
            Direction::Short => format!("tension dropped {:.1}%", tension_change.abs()),
            Direction::Long  => format!("tension magnitude shrinking ({tension_change:+.1}%)"),
        });
    }
    if profit_hit {
        reasons.push(format!("profit {pnl:+.2}%"));
    }

    ExitOutcome::Exited {
        kind:    ExitKind::Golden,
        reason:  format!("golden exit: {}", reasons.join(", ")),
        pnl_pct: pnl,
    }
}

/// Fixed take-profit / stop-loss only.  Leaves `hold_periods` untouched, so
/// it can run on any price observation.
pub fn check_fixed_stop(position: &Position, current: &IndicatorSnapshot) -> Option<ExitOutcome> {
    let kind = fixed_stop(position, current.price)?;
    let pnl  = position.pnl_pct(current.price);
    let reason = match kind {
        ExitKind::FixedTp => format!("fixed take-profit ({pnl:+.2}%)"),
        _                 => format!("fixed stop-loss ({pnl:+.2}%)"),
    };
    Some(ExitOutcome::Exited { kind, reason, pnl_pct: pnl })
}

fn fixed_stop(position: &Position, price: f64) -> Option<ExitKind> {
    let tp  = position.take_profit_price;
    let sl  = position.stop_loss_price;
    let eps = PRICE_TOLERANCE * position.entry_price.abs();

    match position.direction {
        Direction::Long if price >= tp - eps => Some(ExitKind::FixedTp),
        Direction::Long if price <= sl + eps => Some(ExitKind::FixedSl),
        Direction::Short if price <= tp + eps => Some(ExitKind::FixedTp),
        Direction::Short if price >= sl - eps => Some(ExitKind::FixedSl),
        _ => None,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryKind, SignalType};
    use chrono::Utc;

    fn snap(tension: f64, volume: f64, price: f64) -> IndicatorSnapshot {
        IndicatorSnapshot::new(tension, 0.01, volume, price, Utc::now())
    }

    fn long_at(price: f64, tension: f64) -> Position {
        Position::open(SignalType::BullishSingularity, EntryKind::Direct, &snap(tension, 0.8, price), 0.05, 0.025)
    }

    fn short_at(price: f64, tension: f64) -> Position {
        Position::open(SignalType::BearishSingularity, EntryKind::Golden, &snap(tension, 0.8, price), 0.05, 0.025)
    }

    fn kind(outcome: &ExitOutcome) -> Option<ExitKind> {
        match outcome {
            ExitOutcome::Exited { kind, .. } => Some(*kind),
            ExitOutcome::Held => None,
        }
    }

    #[test]
    fn test_long_fixed_take_profit() {
        let mut p = long_at(100.0, -0.8);
        let out = evaluate_exit(&mut p, &snap(-0.8, 0.5, 105.0), &ExitConfig::default());
        assert_eq!(kind(&out), Some(ExitKind::FixedTp));
    }

    #[test]
    fn test_long_fixed_stop_loss() {
        let mut p = long_at(100.0, -0.8);
        let out = evaluate_exit(&mut p, &snap(-0.8, 0.5, 97.5), &ExitConfig::default());
        assert_eq!(kind(&out), Some(ExitKind::FixedSl));
    }

    #[test]
    fn test_short_fixed_levels() {
        let mut p = short_at(100.0, 0.8);
        let out = evaluate_exit(&mut p, &snap(0.8, 0.5, 95.0), &ExitConfig::default());
        assert_eq!(kind(&out), Some(ExitKind::FixedTp));

        let mut p = short_at(100.0, 0.8);
        let out = evaluate_exit(&mut p, &snap(0.8, 0.5, 102.5), &ExitConfig::default());
        assert_eq!(kind(&out), Some(ExitKind::FixedSl));
    }

    #[test]
    fn test_forced_exit_at_max_hold() {
        let mut p = short_at(100.0, 0.8);
        p.hold_periods = 9;
        // volume expanded and profit target met: golden would also fire
        let out = evaluate_exit(&mut p, &snap(0.8, 1.5, 97.0), &ExitConfig::default());
        assert_eq!(p.hold_periods, 10);
        match out {
            ExitOutcome::Exited { kind, reason, .. } => {
                assert_eq!(kind, ExitKind::Forced);
                assert!(reason.starts_with("forced: max hold periods"));
            }
            ExitOutcome::Held => panic!("expected forced exit"),
        }
    }

    #[test]
    fn test_forced_exit_for_every_entry_kind() {
        for entry_kind in [EntryKind::Direct, EntryKind::Golden, EntryKind::Ordinary] {
            let mut p = long_at(100.0, -0.8);
            p.entry_kind = entry_kind;
            p.hold_periods = 10;
            let out = evaluate_exit(&mut p, &snap(-0.9, 0.5, 100.0), &ExitConfig::default());
            assert_eq!(kind(&out), Some(ExitKind::Forced));
        }
    }

    #[test]
    fn test_short_golden_exit_reason_lists_all_conditions() {
        let mut p = short_at(100.0, 0.80);
        // tension 0.80 → 0.60 = -25%, price 97.5 = +2.5%, volume 1.2
        let out = evaluate_exit(&mut p, &snap(0.60, 1.2, 97.5), &ExitConfig::default());
        match out {
            ExitOutcome::Exited { kind, reason, pnl_pct } => {
                assert_eq!(kind, ExitKind::Golden);
                assert!((pnl_pct - 2.5).abs() < 1e-9);
                assert!(reason.contains("volume expansion"));
                assert!(reason.contains("tension dropped"));
                assert!(reason.contains("profit"));
                assert!(!reason.contains("held"));
            }
            ExitOutcome::Held => panic!("expected golden exit"),
        }
    }

    #[test]
    fn test_short_tension_drop_threshold_is_inclusive() {
        // volume trigger on, price flat: only the tension drop can satisfy the target
        let change = Direction::Short.tension_change(0.43, 0.50);
        let cfg = ExitConfig { short_tension_drop: -change, ..ExitConfig::default() };

        let mut p = short_at(100.0, 0.50);
        let out = evaluate_exit(&mut p, &snap(0.43, 1.2, 100.0), &cfg);
        assert_eq!(kind(&out), Some(ExitKind::Golden));

        let mut p = short_at(100.0, 0.50);
        let out = evaluate_exit(&mut p, &snap(0.43, 1.2, 100.0), &ExitConfig::default());
        assert_eq!(kind(&out), Some(ExitKind::Golden));

        let mut p = short_at(100.0, 0.50);
        let out = evaluate_exit(&mut p, &snap(0.4301, 1.2, 100.0), &ExitConfig::default());
        assert_eq!(out, ExitOutcome::Held);
    }

    #[test]
    fn test_fixed_stop_check_keeps_hold_count() {
        let p = long_at(100.0, -0.8);
        assert_eq!(check_fixed_stop(&p, &snap(-0.8, 0.5, 101.0)), None);
        assert_eq!(kind(&check_fixed_stop(&p, &snap(-0.8, 0.5, 97.5)).unwrap()), Some(ExitKind::FixedSl));
        assert_eq!(p.hold_periods, 0);
    }

    #[test]
    fn test_short_needs_trigger_and_target() {
        // target met but no volume expansion and hold < 5
        let mut p = short_at(100.0, 0.80);
        let out = evaluate_exit(&mut p, &snap(0.60, 0.8, 97.5), &ExitConfig::default());
        assert_eq!(out, ExitOutcome::Held);

        // held long enough, but neither tension drop nor profit
        let mut p = short_at(100.0, 0.80);
        p.hold_periods = 5;
        let out = evaluate_exit(&mut p, &snap(0.75, 0.8, 99.5), &ExitConfig::default());
        assert_eq!(out, ExitOutcome::Held);
    }

    #[test]
    fn test_long_golden_on_magnitude_shrink() {
        let mut p = long_at(100.0, -0.80);
        p.hold_periods = 6;
        // hold becomes 7; |T| 0.80 → 0.70
        let out = evaluate_exit(&mut p, &snap(-0.70, 0.8, 100.5), &ExitConfig::default());
        match out {
            ExitOutcome::Exited { kind, reason, .. } => {
                assert_eq!(kind, ExitKind::Golden);
                assert!(reason.contains("held 7 periods"));
                assert!(reason.contains("tension magnitude shrinking"));
            }
            ExitOutcome::Held => panic!("expected golden exit"),
        }
    }

    #[test]
    fn test_long_holds_while_tension_builds() {
        let mut p = long_at(100.0, -0.80);
        p.hold_periods = 6;
        let out = evaluate_exit(&mut p, &snap(-0.90, 0.8, 100.5), &ExitConfig::default());
        assert_eq!(out, ExitOutcome::Held);
        assert_eq!(p.hold_periods, 7);
    }
}
