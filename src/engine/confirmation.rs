//! # engine::confirmation
//!
//! **Confirmation & Golden-Entry Detector** — re-checks every pending signal
//! on each signal tick.
//!
//! ## Why wait?
//!
//! A first signal with middling tension or an expanding volume is often a
//! fake break.  Waiting a few periods and re-checking the same force weeds
//! those out, and sometimes buys a better price than the first tick offered.
//!
//! ## Per tick
//!
//! ```text
//! wait_periods += 1
//!     │
//!     ├─ wait_periods > wait_max        → Expired   (discard, no entry)
//!     ├─ wait_periods < wait_min        → Waiting
//!     │
//!     ├─ [1] Gate
//!     │      short: T >  0.45 && a < 0 && V < 1.0
//!     │      long:  T < -0.45 && a > 0 && V < 1.0
//!     │      fail → Waiting
//!     │
//!     └─ [2] Golden?
//!            tension_change  > 5%    (magnitudes for long)
//!            price_advantage > 0.5%
//!            long only: ratio ≥ 100
//!            → Entered(Golden | Ordinary)
//! ```

use serde::Serialize;
use tracing::debug;

use crate::config::{ensure, env_f64, env_or, ConfigError};
use crate::models::{Direction, EntryKind, IndicatorSnapshot, PendingSignal};

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConfirmationConfig {
    /// First wait period at which entry may be confirmed.
    pub wait_min: u32,
    /// Last wait period at which entry may be confirmed.  One tick later the
    /// pending signal expires.
    pub wait_max: u32,

    /// Short gate: tension must stay above this.
    pub short_tension_floor: f64,
    /// Long gate: tension must stay below this.
    pub long_tension_ceiling: f64,
    /// Both gates: volume ratio must stay below this.
    pub volume_max: f64,

    /// Golden when tension moved more than this many percent.
    pub golden_tension_change: f64,
    /// Golden when price improved by more than this many percent.
    pub golden_price_advantage: f64,
    /// Long only: golden when the current ratio reaches this.
    pub golden_long_ratio: f64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            wait_min:               4,
            wait_max:               6,
            short_tension_floor:    0.45,
            long_tension_ceiling:   -0.45,
            volume_max:             1.0,
            golden_tension_change:  5.0,
            golden_price_advantage: 0.5,
            golden_long_ratio:      100.0,
        }
    }
}

impl ConfirmationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            wait_min:               env_or("ENGINE_WAIT_MIN", d.wait_min)?,
            wait_max:               env_or("ENGINE_WAIT_MAX", d.wait_max)?,
            short_tension_floor:    env_f64("ENGINE_CONFIRM_SHORT_TENSION", d.short_tension_floor)?,
            long_tension_ceiling:   env_f64("ENGINE_CONFIRM_LONG_TENSION", d.long_tension_ceiling)?,
            volume_max:             env_f64("ENGINE_CONFIRM_VOLUME_MAX", d.volume_max)?,
            golden_tension_change:  env_f64("ENGINE_GOLDEN_TENSION_CHANGE", d.golden_tension_change)?,
            golden_price_advantage: env_f64("ENGINE_GOLDEN_PRICE_ADVANTAGE", d.golden_price_advantage)?,
            golden_long_ratio:      env_f64("ENGINE_GOLDEN_LONG_RATIO", d.golden_long_ratio)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.wait_min >= 1, "wait window must start at 1 or later")?;
        ensure(self.wait_min <= self.wait_max, "wait window is inverted")?;
        ensure(self.short_tension_floor > 0.0, "short confirmation tension must be positive")?;
        ensure(self.long_tension_ceiling < 0.0, "long confirmation tension must be negative")?;
        ensure(self.volume_max > 0.0, "confirmation volume max must be positive")
    }
}

// ─── Result ───────────────────────────────────────────────────────────────────

/// Numbers behind an entry decision, carried into the entry event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntryAssessment {
    pub tension_change:  f64,
    pub price_advantage: f64,
    pub is_golden:       bool,
}

impl EntryAssessment {
    pub fn entry_kind(&self) -> EntryKind {
        if self.is_golden { EntryKind::Golden } else { EntryKind::Ordinary }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PendingOutcome {
    /// Keep the record for the next tick.
    StillWaiting { reason: &'static str },
    /// Window closed without confirmation; drop the record.
    Expired,
    /// Confirmed; open a position of `kind` and drop the record.
    Entered { kind: EntryKind, assessment: EntryAssessment },
}

// ─── Gate + Golden ────────────────────────────────────────────────────────────

/// Direction-specific confirmation gate on the current snapshot.
pub fn gate_passes(direction: Direction, current: &IndicatorSnapshot, config: &ConfirmationConfig) -> bool {
    match direction {
        Direction::Short => {
            current.tension > config.short_tension_floor
                && current.acceleration < 0.0
                && current.volume_ratio < config.volume_max
        }
        Direction::Long => {
            current.tension < config.long_tension_ceiling
                && current.acceleration > 0.0
                && current.volume_ratio < config.volume_max
        }
    }
}

/// Golden-entry scoring of `current` against the values captured when the
/// signal first fired.  Pure; identical inputs give identical output.
pub fn assess_entry(
    pending: &PendingSignal,
    current: &IndicatorSnapshot,
    config:  &ConfirmationConfig,
) -> EntryAssessment {
    let direction       = pending.direction;
    let tension_change  = direction.tension_change(current.tension, pending.orig_tension);
    let price_advantage = direction.pnl_pct(pending.orig_price, current.price);

    let is_golden = match direction {
        Direction::Short => {
            tension_change > config.golden_tension_change
                || price_advantage > config.golden_price_advantage
        }
        Direction::Long => {
            tension_change.abs() > config.golden_tension_change
                || price_advantage > config.golden_price_advantage
                || current.ratio() >= config.golden_long_ratio
        }
    };

    EntryAssessment { tension_change, price_advantage, is_golden }
}

// ─── Main Check ───────────────────────────────────────────────────────────────

/// Advances `pending` by one tick and decides what happens to it.
pub fn evaluate_pending(
    pending: &mut PendingSignal,
    current: &IndicatorSnapshot,
    config:  &ConfirmationConfig,
) -> PendingOutcome {
    pending.wait_periods = pending.wait_periods.saturating_add(1);
    let wait = pending.wait_periods;

    if wait > config.wait_max {
        debug!(id = %pending.id, wait, "pending signal expired");
        return PendingOutcome::Expired;
    }

    if wait < config.wait_min {
        debug!(id = %pending.id, wait, min = config.wait_min, "pending signal still maturing");
        return PendingOutcome::StillWaiting { reason: "wait window not reached" };
    }

    if !gate_passes(pending.direction, current, config) {
        debug!(
            id           = %pending.id,
            direction    = %pending.direction,
            wait,
            tension      = current.tension,
            acceleration = current.acceleration,
            volume       = current.volume_ratio,
            "confirmation gate not met"
        );
        return PendingOutcome::StillWaiting { reason: "confirmation gate not met" };
    }

    let assessment = assess_entry(pending, current, config);
    debug!(
        id              = %pending.id,
        direction       = %pending.direction,
        wait,
        tension_change  = assessment.tension_change,
        price_advantage = assessment.price_advantage,
        golden          = assessment.is_golden,
        "pending signal confirmed"
    );

    PendingOutcome::Entered { kind: assessment.entry_kind(), assessment }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
