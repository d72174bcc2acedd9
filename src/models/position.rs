//! # models::position
//!
//! Session records owned by the engine:
//!
//! * [`PendingSignal`] — a raw signal waiting for confirmation.
//! * [`Position`]      — the single open position.
//! * [`TradeRecord`]   — a closed position, kept for history and statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Direction, IndicatorSnapshot, SignalType};

// ─── EntryKind / ExitKind ─────────────────────────────────────────────────────

/// How a position came to be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Classifier saw a strong enough signal to skip confirmation.
    Direct,
    /// Confirmed after waiting, with a tension or price edge.
    Golden,
    /// Confirmed after waiting, without an edge.
    Ordinary,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitKind {
    FixedTp,
    FixedSl,
    Golden,
    Forced,
    /// Closed by an operator outside the exit rules.
    Manual,
}

// ─── PendingSignal ────────────────────────────────────────────────────────────

/// A `wait_confirm` signal tracked across subsequent signal ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSignal {
    pub id:           Uuid,
    pub direction:    Direction,
    pub signal_type:  SignalType,
    /// Tension at the time the raw signal fired.
    pub orig_tension: f64,
    /// Price at the time the raw signal fired.
    pub orig_price:   f64,
    pub created_at:   DateTime<Utc>,
    /// Signal ticks seen since creation.
    pub wait_periods: u32,
}

impl PendingSignal {
    pub fn from_snapshot(signal_type: SignalType, snapshot: &IndicatorSnapshot) -> Self {
        Self {
            id:           Uuid::new_v4(),
            direction:    signal_type.direction(),
            signal_type,
            orig_tension: snapshot.tension,
            orig_price:   snapshot.price,
            created_at:   snapshot.timestamp,
            wait_periods: 0,
        }
    }
}

// ─── Position ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id:                Uuid,
    pub direction:         Direction,
    pub signal_type:       SignalType,
    pub entry_kind:        EntryKind,
    pub entry_price:       f64,
    pub entry_tension:     f64,
    pub entry_time:        DateTime<Utc>,
    /// Exit ticks seen since entry.
    pub hold_periods:      u32,
    pub take_profit_price: f64,
    pub stop_loss_price:   f64,
}

impl Position {
    /// Opens a position at the snapshot price.
    ///
    /// `take_profit` / `stop_loss` are unsigned fractions (`0.05`, `0.025`);
    /// the direction decides which side of the entry each level lands on.
    pub fn open(
        signal_type: SignalType,
        entry_kind:  EntryKind,
        snapshot:    &IndicatorSnapshot,
        take_profit: f64,
        stop_loss:   f64,
    ) -> Self {
        let direction   = signal_type.direction();
        let entry_price = snapshot.price;
        let (take_profit_price, stop_loss_price) = match direction {
            Direction::Long  => (entry_price * (1.0 + take_profit), entry_price * (1.0 - stop_loss)),
            Direction::Short => (entry_price * (1.0 - take_profit), entry_price * (1.0 + stop_loss)),
        };

        Self {
            id: Uuid::new_v4(),
            direction,
            signal_type,
            entry_kind,
            entry_price,
            entry_tension: snapshot.tension,
            entry_time: snapshot.timestamp,
            hold_periods: 0,
            take_profit_price,
            stop_loss_price,
        }
    }

    /// Unrealised return in percent at `price`.
    #[inline]
    pub fn pnl_pct(&self, price: f64) -> f64 {
        self.direction.pnl_pct(self.entry_price, price)
    }
}

// ─── TradeRecord ──────────────────────────────────────────────────────────────

/// A closed position.  Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub position_id:  Uuid,
    pub direction:    Direction,
    pub signal_type:  SignalType,
    pub entry_kind:   EntryKind,
    pub entry_price:  f64,
    pub entry_time:   DateTime<Utc>,
    pub exit_price:   f64,
    pub exit_time:    DateTime<Utc>,
    pub hold_periods: u32,
    pub exit_kind:    ExitKind,
    pub exit_reason:  String,
    pub pnl_pct:      f64,
}

impl TradeRecord {
    pub fn close(
        position:    &Position,
        snapshot:    &IndicatorSnapshot,
        exit_kind:   ExitKind,
        exit_reason: String,
    ) -> Self {
        Self::close_at(position, snapshot.price, snapshot.timestamp, exit_kind, exit_reason)
    }

    /// Closes at a bare price, for exits that have no indicator snapshot.
    pub fn close_at(
        position:    &Position,
        exit_price:  f64,
        exit_time:   DateTime<Utc>,
        exit_kind:   ExitKind,
        exit_reason: String,
    ) -> Self {
        Self {
            position_id:  position.id,
            direction:    position.direction,
            signal_type:  position.signal_type,
            entry_kind:   position.entry_kind,
            entry_price:  position.entry_price,
            entry_time:   position.entry_time,
            exit_price,
            exit_time,
            hold_periods: position.hold_periods,
            exit_kind,
            exit_reason,
            pnl_pct:      position.pnl_pct(exit_price),
        }
    }
}
