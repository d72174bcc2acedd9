//! # routes::monitor
//!
//! ## Endpoints
//!
//! | Method    | Path                    | Description                                   |
//! |-----------|-------------------------|-----------------------------------------------|
//! | GET (WS)  | `/ws/monitor`           | WebSocket stream of decision events           |
//! | GET       | `/api/monitor/status`   | Position, pending, stats, last signal         |
//! | GET       | `/api/monitor/history`  | Closed trades, oldest first                   |
//! | GET       | `/api/monitor/signals`  | Recent classified signals and their outcome   |

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use tracing::{debug, info};

use crate::state::SharedState;

// ─── WebSocket Handler ────────────────────────────────────────────────────────

/// Upgrade HTTP → WebSocket and subscribe to the decision stream.
///
/// The client gets a `SNAPSHOT` frame with the current status first, then
/// every [`crate::events::DecisionEvent`] as a JSON text frame.
pub async fn ws_monitor(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let mut rx = state.broadcast_tx.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("🔌 WebSocket client connected");

    let mut snapshot = status_report(&state).await;
    snapshot["event"] = json!("SNAPSHOT");

    if sender.send(Message::Text(snapshot.to_string().into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(json_str) => {
                        if sender.send(Message::Text(json_str.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!("WS client lagged, skipped {n} events");
                    }
                    Err(_) => break,
                }
            }

            result = receiver.next() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("🔌 WebSocket client disconnected");
}

// ─── Status Report ────────────────────────────────────────────────────────────

async fn status_report(state: &SharedState) -> Value {
    let store = state.store.lock().await;
    let stats = store.stats();

    json!({
        "ok":          true,
        "position":    store.position(),
        "pending":     store.pending(),
        "stats": {
            "total_trades":   stats.total_trades,
            "winning_trades": stats.winning_trades,
            "losing_trades":  stats.losing_trades,
            "total_pnl_pct":  stats.total_pnl_pct,
            "win_rate_pct":   stats.win_rate(),
        },
        "last_signal": store.last_signal(),
        "ticks": {
            "signal":  state.signal_ticks.load(Ordering::Relaxed),
            "exit":    state.exit_ticks.load(Ordering::Relaxed),
            "skipped": state.skipped_ticks.load(Ordering::Relaxed),
            "manual":  state.manual_checks.load(Ordering::Relaxed),
        },
    })
}

// ─── REST Monitoring Endpoints ────────────────────────────────────────────────

/// GET /api/monitor/status
pub async fn get_status(State(state): State<SharedState>) -> impl IntoResponse {
    Json(status_report(&state).await)
}

/// GET /api/monitor/history
pub async fn get_history(State(state): State<SharedState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    let history = store.history();
    Json(json!({
        "ok":      true,
        "count":   history.len(),
        "records": history,
    }))
}

/// GET /api/monitor/signals
pub async fn get_signals(State(state): State<SharedState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    let signals = store.signals();
    Json(json!({
        "ok":      true,
        "count":   signals.len(),
        "signals": signals,
    }))
}
