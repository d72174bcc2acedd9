//! # state
//!
//! AppState — the single [`StateStore`] behind one mutex, the loaded
//! configuration, the decision-event broadcast channel and the shared HTTP
//! client.
//!
//! Every tick goes through [`AppState::run_signal_tick`] or
//! [`AppState::run_exit_tick`], every operator action through
//! [`AppState::run_manual_check`] or [`AppState::close_position`]:
//! lock → decide → persist → unlock, then broadcast the events.  Snapshot
//! fetches happen before the lock is taken.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, warn};

use crate::config::{EngineConfig, ServiceConfig};
use crate::engine::session::{close_manual, on_exit_tick, on_manual_check, on_signal_tick};
use crate::events::DecisionEvent;
use crate::models::{IndicatorSnapshot, SignalType, TradeRecord};
use crate::store::StateStore;

/// Buffered decision events per WebSocket subscriber.
const BROADCAST_CAPACITY: usize = 256;

// ─── AppState ─────────────────────────────────────────────────────────────────

/// Top-level shared state injected into every Axum handler and the scheduler.
#[derive(Clone)]
pub struct AppState {
    // ── Decision State ────────────────────────────────────────────────────────
    /// Position, pending confirmations, statistics.  One writer per tick.
    pub store: Arc<Mutex<StateStore>>,

    // ── Configuration ─────────────────────────────────────────────────────────
    pub engine:  Arc<EngineConfig>,
    pub service: Arc<ServiceConfig>,

    // ── Monitor / WebSocket ───────────────────────────────────────────────────
    /// Pre-serialised [`DecisionEvent`] JSON for WebSocket clients.
    pub broadcast_tx: broadcast::Sender<String>,

    // ── HTTP Client ───────────────────────────────────────────────────────────
    /// Used for the indicator source; shared for connection pooling.
    pub http_client: reqwest::Client,

    // ── Metrics ───────────────────────────────────────────────────────────────
    pub signal_ticks:  Arc<AtomicU64>,
    pub exit_ticks:    Arc<AtomicU64>,
    pub skipped_ticks: Arc<AtomicU64>,
    pub manual_checks: Arc<AtomicU64>,
    pub started_at:    DateTime<Utc>,
}

impl AppState {
    pub fn new(store: StateStore, engine: EngineConfig, service: ServiceConfig) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        Self {
            store:         Arc::new(Mutex::new(store)),
            engine:        Arc::new(engine),
            service:       Arc::new(service),
            broadcast_tx,
            http_client:   reqwest::Client::new(),
            signal_ticks:  Arc::new(AtomicU64::new(0)),
            exit_ticks:    Arc::new(AtomicU64::new(0)),
            skipped_ticks: Arc::new(AtomicU64::new(0)),
            manual_checks: Arc::new(AtomicU64::new(0)),
            started_at:    Utc::now(),
        }
    }

    // ── Ticks ─────────────────────────────────────────────────────────────────

    /// Evaluates pending confirmations and classifies `signal`, if any.
    pub async fn run_signal_tick(
        &self,
        signal:   Option<SignalType>,
        snapshot: &IndicatorSnapshot,
    ) -> Vec<DecisionEvent> {
        let events = {
            let mut store = self.store.lock().await;
            let events = on_signal_tick(&mut store, signal, snapshot, &self.engine);
            self.persist(&store).await;
            events
        };

        self.signal_ticks.fetch_add(1, Ordering::Relaxed);
        debug!(events = events.len(), signal = ?signal, "signal tick done");
        self.publish(&events);
        events
    }

    /// Evaluates the open position, if any.
    pub async fn run_exit_tick(&self, snapshot: &IndicatorSnapshot) -> Vec<DecisionEvent> {
        let events = {
            let mut store = self.store.lock().await;
            let events = on_exit_tick(&mut store, snapshot, &self.engine);
            if !events.is_empty() {
                self.persist(&store).await;
            }
            events
        };

        self.exit_ticks.fetch_add(1, Ordering::Relaxed);
        debug!(events = events.len(), "exit tick done");
        self.publish(&events);
        events
    }

    /// Classifies `signal` and applies fixed stops without advancing any
    /// wait or hold counter.
    pub async fn run_manual_check(
        &self,
        signal:   Option<SignalType>,
        snapshot: &IndicatorSnapshot,
    ) -> Vec<DecisionEvent> {
        let events = {
            let mut store = self.store.lock().await;
            let events = on_manual_check(&mut store, signal, snapshot, &self.engine);
            let closed = events.iter().any(|e| matches!(e, DecisionEvent::PositionClosed { .. }));
            if signal.is_some() || closed {
                self.persist(&store).await;
            }
            events
        };

        self.manual_checks.fetch_add(1, Ordering::Relaxed);
        debug!(events = events.len(), signal = ?signal, "manual check done");
        self.publish(&events);
        events
    }

    /// Closes the open position at `price`.  `None` when nothing is open.
    pub async fn close_position(
        &self,
        price:  f64,
        at:     DateTime<Utc>,
        reason: String,
    ) -> Option<TradeRecord> {
        let record = {
            let mut store = self.store.lock().await;
            let record = close_manual(&mut store, price, at, reason)?;
            self.persist(&store).await;
            record
        };

        self.broadcast(&DecisionEvent::PositionClosed { record: Box::new(record.clone()) });
        Some(record)
    }

    /// Records a tick that produced no decision because no usable input
    /// arrived.
    pub fn skip_tick(&self, reason: String) -> DecisionEvent {
        self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
        warn!(reason = %reason, "⏭️ tick skipped — state unchanged");
        let event = DecisionEvent::TickSkipped { reason };
        self.broadcast(&event);
        event
    }

    // ── Helper Methods ────────────────────────────────────────────────────────

    /// Broadcast a DecisionEvent to every WebSocket client.
    /// No listener is not an error (headless mode).
    pub fn broadcast(&self, event: &DecisionEvent) {
        let _ = self.broadcast_tx.send(event.to_json());
    }

    fn publish(&self, events: &[DecisionEvent]) {
        for event in events {
            self.broadcast(event);
        }
    }

    /// A failed write keeps the in-memory state; the next tick retries.
    async fn persist(&self, store: &StateStore) {
        if let Err(e) = store.save(&self.service.state_path).await {
            error!(
                path  = %self.service.state_path.display(),
                error = %format!("{e:#}"),
                "❌ failed to persist state"
            );
        }
    }
}

/// Convenience type alias
pub type SharedState = Arc<AppState>;

pub fn build_state(store: StateStore, engine: EngineConfig, service: ServiceConfig) -> SharedState {
    Arc::new(AppState::new(store, engine, service))
}
