//! # routes::health

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;
use std::sync::atomic::Ordering;

use crate::state::SharedState;

// ─── GET /health ──────────────────────────────────────────────────────────────

/// Liveness check.  Never authenticated, never touches the store lock.
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "ok":             true,
        "uptime_secs":    (Utc::now() - state.started_at).num_seconds(),
        "scheduler":      state.service.indicator_url.is_some(),
        "signal_ticks":   state.signal_ticks.load(Ordering::Relaxed),
        "exit_ticks":     state.exit_ticks.load(Ordering::Relaxed),
        "skipped_ticks":  state.skipped_ticks.load(Ordering::Relaxed),
        "manual_checks":  state.manual_checks.load(Ordering::Relaxed),
    }))
}
