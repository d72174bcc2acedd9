//! # scheduler — Tick loops
//!
//! ```text
//! every SIGNAL_INTERVAL_SECS (4h):  fetch → resolve signal → signal tick
//! every EXIT_INTERVAL_SECS   (1h):  position open? → fetch → exit tick
//! ```
//!
//! A manual recheck fetches once and runs a manual check on the result; it
//! never advances the wait or hold counters the loops own.
//!
//! Both loops only run when `INDICATOR_URL` is set.  A fetch failure skips
//! the tick and leaves state untouched; the loop carries on at the next
//! interval.

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::regime::resolve_signal;
use crate::error::EngineError;
use crate::events::DecisionEvent;
use crate::market::{fetch_snapshot, IndicatorReading};
use crate::state::SharedState;

/// Starts both tick loops in the background.  No-op without an indicator
/// source.
pub fn spawn(state: SharedState) {
    if state.service.indicator_url.is_none() {
        info!("INDICATOR_URL not set — scheduler disabled, ticks arrive over HTTP only");
        return;
    }

    info!(
        signal_interval = ?state.service.signal_interval,
        exit_interval   = ?state.service.exit_interval,
        "⏱️ scheduler started"
    );

    tokio::spawn(signal_loop(state.clone()));
    tokio::spawn(exit_loop(state));
}

async fn signal_loop(state: SharedState) {
    let mut ticker = interval(state.service.signal_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = signal_tick(&state).await {
            debug!(error = %e, "scheduled signal tick produced no decision");
        }
    }
}

async fn exit_loop(state: SharedState) {
    let mut ticker = interval(state.service.exit_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if state.store.lock().await.position().is_none() {
            debug!("no open position — exit tick idle");
            continue;
        }
        if let Err(e) = exit_tick(&state).await {
            debug!(error = %e, "scheduled exit tick produced no decision");
        }
    }
}

// ─── Ticks ────────────────────────────────────────────────────────────────────

/// Fetches a snapshot; a failure is recorded as a skipped tick.
async fn fetch(state: &SharedState) -> Result<IndicatorReading, EngineError> {
    let Some(url) = state.service.indicator_url.as_deref() else {
        let err = EngineError::FetchFailed("INDICATOR_URL not configured".to_string());
        state.skip_tick(err.to_string());
        return Err(err);
    };

    match fetch_snapshot(&state.http_client, url, state.service.fetch_timeout).await {
        Ok(reading) => Ok(reading),
        Err(e) => {
            state.skip_tick(e.to_string());
            Err(e)
        }
    }
}

pub async fn signal_tick(state: &SharedState) -> Result<Vec<DecisionEvent>, EngineError> {
    let reading = fetch(state).await?;
    let signal = resolve_signal(
        reading.signal_type.as_deref(),
        &reading.snapshot,
        &state.engine.regime,
    )
    .map_err(|e| {
        warn!(error = %e, "❌ indicator source sent an unknown signal type — tick rejected");
        e
    })?;

    Ok(state.run_signal_tick(signal, &reading.snapshot).await)
}

pub async fn exit_tick(state: &SharedState) -> Result<Vec<DecisionEvent>, EngineError> {
    let reading = fetch(state).await?;
    Ok(state.run_exit_tick(&reading.snapshot).await)
}

/// Manual recheck: one fetch, then a manual check of the resolved signal and
/// the open position's fixed stops on the same snapshot.
pub async fn recheck(state: &SharedState) -> Result<Vec<DecisionEvent>, EngineError> {
    let reading = fetch(state).await?;
    let signal = resolve_signal(
        reading.signal_type.as_deref(),
        &reading.snapshot,
        &state.engine.regime,
    )?;

    info!(signal = ?signal, price = reading.snapshot.price, "🔄 manual recheck");

    Ok(state.run_manual_check(signal, &reading.snapshot).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignalType;
    use crate::state::test_support::{state_in, state_with_source};
    use axum::{routing::get, Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::Ordering;

    async fn source(body: Value) -> String {
        let app = Router::new().route(
            "/indicators",
            get(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/indicators")
    }

    #[tokio::test]
    async fn test_recheck_without_source_skips() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let err = recheck(&state).await.unwrap_err();
        assert!(matches!(err, EngineError::FetchFailed(_)));
        assert_eq!(state.skipped_ticks.load(Ordering::Relaxed), 1);
        assert!(state.store.lock().await.last_signal().is_none());
    }

    #[tokio::test]
    async fn test_recheck_opens_without_counting_a_hold() {
        let url = source(json!({
            "tension": 0.9, "acceleration": -0.009, "volume_ratio": 0.7,
            "price": 100.0, "signal_type": "HIGH_OSCILLATION"
        }))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_source(dir.path(), Some(url));

        let events = recheck(&state).await.unwrap();
        assert!(events.iter().any(|e| matches!(e, DecisionEvent::PositionOpened { .. })));
        assert!(events.iter().any(|e| matches!(e, DecisionEvent::PositionHeld { hold_periods: 0, .. })));

        let store = state.store.lock().await;
        assert_eq!(store.position().map(|p| p.signal_type), Some(SignalType::HighOscillation));
        assert_eq!(store.position().map(|p| p.hold_periods), Some(0));
        assert_eq!(state.signal_ticks.load(Ordering::Relaxed), 0);
        assert_eq!(state.exit_ticks.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_recheck_burst_keeps_pending_waiting() {
        let url = source(json!({
            "tension": 0.6, "acceleration": -0.01, "volume_ratio": 1.2,
            "price": 100.0, "signal_type": "BEARISH_SINGULARITY"
        }))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_source(dir.path(), Some(url));

        for _ in 0..8 {
            let events = recheck(&state).await.unwrap();
            assert!(!events.iter().any(|e| matches!(e, DecisionEvent::PendingExpired { .. })));
        }

        let store = state.store.lock().await;
        assert_eq!(store.pending().len(), 1);
        assert_eq!(store.pending()[0].wait_periods, 0);
        assert!(store.position().is_none());
    }

    #[tokio::test]
    async fn test_unknown_label_rejects_tick() {
        let url = source(json!({
            "tension": 0.9, "acceleration": -0.009, "volume_ratio": 0.7,
            "price": 100.0, "signal_type": "SIDEWAYS"
        }))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_source(dir.path(), Some(url));

        let err = signal_tick(&state).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSignalType(_)));
        assert!(state.store.lock().await.last_signal().is_none());
        assert!(!state.service.state_path.exists());
    }
}
