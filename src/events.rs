//! # events
//!
//! Defines [`DecisionEvent`], every decision the engine emits.  Events are
//! logged, then broadcast as JSON strings to WebSocket subscribers; an
//! external notifier can subscribe to the same stream and format them as it
//! likes.

use serde::Serialize;
use uuid::Uuid;

use crate::engine::{classifier::Classification, confirmation::EntryAssessment};
use crate::models::{Direction, IndicatorSnapshot, PendingSignal, Position, SignalType, TradeRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionEvent {
    /// A raw signal went through the classifier.
    SignalDetected {
        classification: Classification,
        snapshot:       IndicatorSnapshot,
    },

    /// A classified signal was not acted on because of session state.
    SignalSuppressed {
        signal_type: SignalType,
        direction:   Direction,
        reason:      String,
    },

    /// A `wait_confirm` signal is now being tracked.
    PendingCreated {
        pending: PendingSignal,
    },

    /// A pending signal ran out of wait periods without confirming.
    PendingExpired {
        pending: PendingSignal,
    },

    /// A pending signal confirmed while a position was already open.
    EntryBlocked {
        pending_id: Uuid,
        direction:  Direction,
        reason:     String,
    },

    /// A position was opened (direct, golden or ordinary).
    PositionOpened {
        position:   Box<Position>,
        /// Present for confirmed entries, absent for direct ones.
        assessment: Option<EntryAssessment>,
    },

    /// The open position was evaluated and kept.
    PositionHeld {
        position_id:  Uuid,
        hold_periods: u32,
        pnl_pct:      f64,
    },

    /// The open position was closed.
    PositionClosed {
        record: Box<TradeRecord>,
    },

    /// No usable snapshot this tick; nothing was decided.
    TickSkipped {
        reason: String,
    },
}

impl DecisionEvent {
    /// Serialises the event for the broadcast channel.
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"SERIALIZATION_ERROR"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tag() {
        let json = DecisionEvent::TickSkipped { reason: "timeout".into() }.to_json();
        assert_eq!(json, r#"{"event":"TICK_SKIPPED","reason":"timeout"}"#);
    }
}
