//! # routes::signal
//!
//! Operator endpoints: push a snapshot in (signal or exit tick), ask the
//! service to recheck the indicator source, or close the open position.

use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    error::{AppError, EngineError},
    events::DecisionEvent,
    market::fetch_snapshot,
    models::{IndicatorSnapshot, SignalType},
    scheduler,
    state::SharedState,
};

// ─── Payloads ─────────────────────────────────────────────────────────────────

/// Snapshot as posted by a caller; `timestamp` defaults to receipt time.
#[derive(Debug, Deserialize)]
pub struct SnapshotInput {
    pub tension:      f64,
    pub acceleration: f64,
    pub volume_ratio: f64,
    #[serde(default)]
    pub ratio:        Option<f64>,
    pub price:        f64,
    #[serde(default)]
    pub timestamp:    Option<DateTime<Utc>>,
}

impl SnapshotInput {
    fn into_snapshot(self) -> Result<IndicatorSnapshot, AppError> {
        let mut snapshot = IndicatorSnapshot::new(
            self.tension,
            self.acceleration,
            self.volume_ratio,
            self.price,
            self.timestamp.unwrap_or_else(Utc::now),
        );
        if self.ratio.is_some() {
            snapshot.ratio = self.ratio;
        }
        if !snapshot.is_usable() {
            return Err(AppError::BadRequest(
                "snapshot values must be finite and price must be positive".into(),
            ));
        }
        Ok(snapshot)
    }
}

#[derive(Debug, Deserialize)]
pub struct SignalRequest {
    /// Omitted → pending confirmations are evaluated, nothing new is
    /// classified.
    #[serde(default)]
    pub signal_type: Option<String>,
    pub snapshot:    SnapshotInput,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub snapshot: SnapshotInput,
}

/// Both fields optional: without `price` the indicator source is asked.
#[derive(Debug, Default, Deserialize)]
pub struct CloseRequest {
    #[serde(default)]
    pub price:  Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

// ─── POST /api/signal ─────────────────────────────────────────────────────────

/// Runs a signal tick with the posted snapshot.  An unknown signal type is
/// rejected before the store is touched.
pub async fn post_signal(
    State(state): State<SharedState>,
    Json(req): Json<SignalRequest>,
) -> Result<impl IntoResponse, AppError> {
    let signal = req
        .signal_type
        .as_deref()
        .map(str::parse::<SignalType>)
        .transpose()
        .map_err(|e| {
            warn!(error = %e, "❌ signal rejected");
            e
        })?;
    let snapshot = req.snapshot.into_snapshot()?;

    info!(signal = ?signal, price = snapshot.price, "📥 signal received over HTTP");
    let events = state.run_signal_tick(signal, &snapshot).await;

    Ok(Json(json!({
        "ok":     true,
        "events": events,
    })))
}

// ─── POST /api/evaluate ───────────────────────────────────────────────────────

/// Runs an exit tick with the posted snapshot.
pub async fn post_evaluate(
    State(state): State<SharedState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = req.snapshot.into_snapshot()?;
    let events = state.run_exit_tick(&snapshot).await;
    let has_position = events
        .iter()
        .any(|e| matches!(e, DecisionEvent::PositionHeld { .. }));

    Ok(Json(json!({
        "ok":           true,
        "has_position": has_position,
        "events":       events,
    })))
}

// ─── POST /api/recheck ────────────────────────────────────────────────────────

/// Fetches a snapshot from the indicator source and runs a manual check:
/// the label is classified and fixed stops apply, but no wait or hold period
/// is counted.
pub async fn post_recheck(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let events = scheduler::recheck(&state).await.map_err(|e| match e {
        EngineError::InvalidSignalType(_) => AppError::Upstream(e.to_string()),
        other => other.into(),
    })?;

    Ok(Json(json!({
        "ok":     true,
        "events": events,
    })))
}

// ─── POST /api/close ──────────────────────────────────────────────────────────

/// Closes the open position outside the exit rules and books it as a
/// `manual` exit.  404 when nothing is open.
pub async fn post_close(
    State(state): State<SharedState>,
    Json(req): Json<CloseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (price, at) = match req.price {
        Some(price) if price.is_finite() && price > 0.0 => (price, Utc::now()),
        Some(_) => {
            return Err(AppError::BadRequest("price must be finite and positive".into()));
        }
        None => {
            let url = state.service.indicator_url.as_deref().ok_or_else(|| {
                AppError::BadRequest("no price given and INDICATOR_URL not configured".into())
            })?;
            let reading = fetch_snapshot(&state.http_client, url, state.service.fetch_timeout).await?;
            (reading.snapshot.price, reading.snapshot.timestamp)
        }
    };

    let reason = req.reason.unwrap_or_else(|| "manual close".to_string());
    info!(price, reason = %reason, "✋ manual close requested");

    let record = state
        .close_position(price, at, reason)
        .await
        .ok_or_else(|| AppError::NotFound("no open position".into()))?;

    Ok(Json(json!({
        "ok":     true,
        "record": record,
    })))
}
