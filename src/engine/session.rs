//! # engine::session
//!
//! Tick handlers: the only code that mutates the [`StateStore`].
//!
//! ## Signal tick (every 4h)
//! ```text
//! 1. Re-evaluate every pending signal   → Waiting | Expired | Entered
//! 2. Classify the new raw signal (if any)
//!    a. position open            → suppressed
//!    b. ignore                   → recorded only
//!    c. direct_enter             → open Position(direct)
//!    d. wait_confirm             → PendingSignal, unless one of the same
//!                                  direction is already waiting
//! ```
//! Pending signals are evaluated before the new signal is classified so a
//! freshly created record starts counting on the next tick.
//!
//! ## Exit tick (every 1h)
//! ```text
//! no position → nothing
//! otherwise   → evaluate_exit → Held | Closed
//! ```
//!
//! ## Manual check / manual close
//! A manual check classifies a signal and applies the fixed stops without
//! advancing any wait or hold counter, so it can run any number of times
//! between scheduled ticks.  A manual close books the open position at a
//! given price.
//!
//! Every handler is synchronous and total; the caller holds the store lock
//! for the duration of one call.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::EngineConfig;
use crate::engine::{
    classifier::classify,
    confirmation::{evaluate_pending, PendingOutcome},
    exit::{check_fixed_stop, evaluate_exit, ExitOutcome},
};
use crate::events::DecisionEvent;
use crate::models::{
    Disposition, EntryKind, ExitKind, IndicatorSnapshot, PendingSignal, Position, SignalType, TradeRecord,
};
use crate::store::{SignalOutcome, SignalRecord, StateStore};

// ─── Signal Tick ──────────────────────────────────────────────────────────────

pub fn on_signal_tick(
    store:    &mut StateStore,
    signal:   Option<SignalType>,
    snapshot: &IndicatorSnapshot,
    config:   &EngineConfig,
) -> Vec<DecisionEvent> {
    let mut events = advance_pending(store, snapshot, config);

    if let Some(signal_type) = signal {
        events.extend(handle_signal(store, signal_type, snapshot, config));
    }

    events
}

/// Step 1: every pending signal moves one tick forward.
fn advance_pending(
    store:    &mut StateStore,
    snapshot: &IndicatorSnapshot,
    config:   &EngineConfig,
) -> Vec<DecisionEvent> {
    let mut events    = Vec::new();
    let mut survivors = Vec::new();

    for mut pending in store.take_pending() {
        match evaluate_pending(&mut pending, snapshot, &config.confirmation) {
            PendingOutcome::StillWaiting { .. } => survivors.push(pending),

            PendingOutcome::Expired => {
                info!(
                    id        = %pending.id,
                    direction = %pending.direction,
                    wait      = pending.wait_periods,
                    "⌛ pending signal expired without confirmation"
                );
                store.settle_signal(
                    pending.id,
                    SignalOutcome::Filtered,
                    format!("expired after {} periods without confirmation", pending.wait_periods),
                );
                events.push(DecisionEvent::PendingExpired { pending });
            }

            PendingOutcome::Entered { kind, assessment } => {
                let position = Position::open(
                    pending.signal_type,
                    kind,
                    snapshot,
                    config.exit.take_profit,
                    config.exit.stop_loss,
                );

                if store.open(position.clone()) {
                    info!(
                        position_id     = %position.id,
                        direction       = %position.direction,
                        kind            = ?kind,
                        entry_price     = position.entry_price,
                        wait            = pending.wait_periods,
                        tension_change  = assessment.tension_change,
                        price_advantage = assessment.price_advantage,
                        "{} confirmed entry opened",
                        if kind == EntryKind::Golden { "✨" } else { "🎯" }
                    );
                    store.settle_signal(
                        pending.id,
                        SignalOutcome::Traded,
                        format!("confirmed after {} periods ({kind:?} entry)", pending.wait_periods),
                    );
                    events.push(DecisionEvent::PositionOpened {
                        position:   Box::new(position),
                        assessment: Some(assessment),
                    });
                } else {
                    info!(id = %pending.id, "confirmed entry blocked — position already open");
                    store.settle_signal(
                        pending.id,
                        SignalOutcome::Filtered,
                        "confirmed while a position was open".to_string(),
                    );
                    events.push(DecisionEvent::EntryBlocked {
                        pending_id: pending.id,
                        direction:  pending.direction,
                        reason:     "position already open".to_string(),
                    });
                }
            }
        }
    }

    store.restore_pending(survivors);
    events
}

/// Step 2: classify a new raw signal, apply its side effect and log it.
fn handle_signal(
    store:       &mut StateStore,
    signal_type: SignalType,
    snapshot:    &IndicatorSnapshot,
    config:      &EngineConfig,
) -> Vec<DecisionEvent> {
    let classification = classify(signal_type, snapshot, &config.classifier);
    let direction      = classification.direction;
    let disposition    = classification.disposition;

    let mut record = SignalRecord {
        signal_type,
        direction,
        disposition,
        outcome:    SignalOutcome::Filtered,
        pending_id: None,
        tension:    snapshot.tension,
        price:      snapshot.price,
        at:         snapshot.timestamp,
        reason:     classification.reason.clone(),
    };

    info!(
        %signal_type,
        %direction,
        disposition = disposition.as_str(),
        price       = snapshot.price,
        "📡 signal classified"
    );

    let mut events = vec![DecisionEvent::SignalDetected {
        classification,
        snapshot: *snapshot,
    }];

    if disposition != Disposition::Ignore && store.position().is_some() {
        let reason = "position already open".to_string();
        record.reason = reason.clone();
        events.push(DecisionEvent::SignalSuppressed { signal_type, direction, reason });
        store.record_signal(record);
        return events;
    }

    match disposition {
        Disposition::DirectEnter => {
            let position = Position::open(
                signal_type,
                EntryKind::Direct,
                snapshot,
                config.exit.take_profit,
                config.exit.stop_loss,
            );
            store.open(position.clone());
            info!(
                position_id = %position.id,
                %direction,
                entry_price = position.entry_price,
                tp          = position.take_profit_price,
                sl          = position.stop_loss_price,
                "🚀 direct entry opened"
            );
            record.outcome = SignalOutcome::Traded;
            events.push(DecisionEvent::PositionOpened {
                position:   Box::new(position),
                assessment: None,
            });
        }

        Disposition::WaitConfirm => {
            let pending = PendingSignal::from_snapshot(signal_type, snapshot);
            if store.add_pending(pending.clone()) {
                info!(id = %pending.id, %direction, "⏳ awaiting confirmation");
                record.outcome    = SignalOutcome::Pending;
                record.pending_id = Some(pending.id);
                events.push(DecisionEvent::PendingCreated { pending });
            } else {
                let reason = format!("{direction} signal already pending");
                record.reason = reason.clone();
                events.push(DecisionEvent::SignalSuppressed { signal_type, direction, reason });
            }
        }

        Disposition::Ignore => {}
    }

    store.record_signal(record);
    events
}

// ─── Exit Tick ────────────────────────────────────────────────────────────────

pub fn on_exit_tick(
    store:    &mut StateStore,
    snapshot: &IndicatorSnapshot,
    config:   &EngineConfig,
) -> Vec<DecisionEvent> {
    let Some(position) = store.position_mut() else {
        return Vec::new();
    };

    match evaluate_exit(position, snapshot, &config.exit) {
        ExitOutcome::Held => vec![held(position, snapshot)],

        ExitOutcome::Exited { kind, reason, .. } => {
            let record = TradeRecord::close(position, snapshot, kind, reason);
            vec![book_close(store, record)]
        }
    }
}

// ─── Manual Check ─────────────────────────────────────────────────────────────

/// Off-cadence evaluation of one snapshot.
///
/// A new `signal` is classified exactly as on a signal tick, but pending
/// records are not evaluated and the open position only answers to its fixed
/// TP/SL.  Neither `wait_periods` nor `hold_periods` moves.
pub fn on_manual_check(
    store:    &mut StateStore,
    signal:   Option<SignalType>,
    snapshot: &IndicatorSnapshot,
    config:   &EngineConfig,
) -> Vec<DecisionEvent> {
    let mut events = match signal {
        Some(signal_type) => handle_signal(store, signal_type, snapshot, config),
        None              => Vec::new(),
    };

    let Some(position) = store.position() else {
        return events;
    };

    match check_fixed_stop(position, snapshot) {
        Some(ExitOutcome::Exited { kind, reason, .. }) => {
            let record = TradeRecord::close(position, snapshot, kind, reason);
            events.push(book_close(store, record));
        }
        _ => events.push(held(position, snapshot)),
    }

    events
}

// ─── Manual Close ─────────────────────────────────────────────────────────────

/// Closes the open position at `price`, outside the exit rules.  Returns
/// `None` when nothing is open.
pub fn close_manual(
    store:  &mut StateStore,
    price:  f64,
    at:     DateTime<Utc>,
    reason: String,
) -> Option<TradeRecord> {
    let position = store.position()?;
    let record = TradeRecord::close_at(position, price, at, ExitKind::Manual, reason);
    book_close(store, record.clone());
    Some(record)
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn held(position: &Position, snapshot: &IndicatorSnapshot) -> DecisionEvent {
    DecisionEvent::PositionHeld {
        position_id:  position.id,
        hold_periods: position.hold_periods,
        pnl_pct:      position.pnl_pct(snapshot.price),
    }
}

fn book_close(store: &mut StateStore, record: TradeRecord) -> DecisionEvent {
    info!(
        position_id = %record.position_id,
        direction   = %record.direction,
        kind        = ?record.exit_kind,
        exit_price  = record.exit_price,
        pnl_pct     = record.pnl_pct,
        reason      = %record.exit_reason,
        "🏁 position closed"
    );
    store.close(record.clone());
    DecisionEvent::PositionClosed { record: Box::new(record) }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
