//! # store
//!
//! **State Store** — the single open [`Position`], the pending confirmations,
//! trade statistics, a bounded log of classified signals and the closed
//! trade history.
//!
//! The store is plain data with invariant-keeping methods; it knows nothing
//! about locking.  [`crate::state::AppState`] wraps it in one mutex and every
//! tick runs to completion under that lock.
//!
//! ## Persistence
//!
//! The whole store round-trips through JSON so an open position and
//! in-flight confirmations survive a restart.  Writes go to a sibling temp
//! file and are renamed into place.  An unreadable file is deleted and the
//! store starts empty.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Direction, Disposition, PendingSignal, Position, SignalType, TradeRecord};

const STATE_VERSION: u32 = 1;
const DEFAULT_HISTORY_LIMIT: usize = 500;
/// Classified signals kept for the monitor.
pub const SIGNAL_HISTORY_LIMIT: usize = 50;

// ─── Stats / Signals ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades:   u32,
    pub winning_trades: u32,
    pub losing_trades:  u32,
    /// Sum of per-trade returns, in percent.
    pub total_pnl_pct:  f64,
}

impl TradeStats {
    fn record(&mut self, trade: &TradeRecord) {
        self.total_trades += 1;
        if trade.pnl_pct > 0.0 {
            self.winning_trades += 1;
        } else {
            self.losing_trades += 1;
        }
        self.total_pnl_pct += trade.pnl_pct;
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            f64::from(self.winning_trades) / f64::from(self.total_trades) * 100.0
        }
    }
}

/// What became of a classified signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalOutcome {
    /// A position was opened from it, directly or after confirmation.
    Traded,
    /// Waiting for confirmation.
    Pending,
    /// Ignored, suppressed, blocked or expired; `reason` says which.
    #[default]
    Filtered,
}

/// One signal the classifier saw, whatever it decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub signal_type: SignalType,
    pub direction:   Direction,
    pub disposition: Disposition,
    #[serde(default)]
    pub outcome:     SignalOutcome,
    /// Set while the signal has a pending confirmation record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_id:  Option<Uuid>,
    pub tension:     f64,
    pub price:       f64,
    pub at:          DateTime<Utc>,
    pub reason:      String,
}

// ─── StateStore ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateStore {
    version:     u32,
    position:    Option<Position>,
    pending:     Vec<PendingSignal>,
    stats:       TradeStats,
    #[serde(default)]
    signals:     VecDeque<SignalRecord>,
    history:     VecDeque<TradeRecord>,

    #[serde(skip, default = "default_history_limit")]
    history_limit: usize,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl StateStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            version:     STATE_VERSION,
            position:    None,
            pending:     Vec::new(),
            stats:       TradeStats::default(),
            signals:     VecDeque::new(),
            history:     VecDeque::new(),
            history_limit,
        }
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn pending(&self) -> &[PendingSignal] {
        &self.pending
    }

    pub fn pending_for(&self, direction: Direction) -> Option<&PendingSignal> {
        self.pending.iter().find(|p| p.direction == direction)
    }

    pub fn stats(&self) -> &TradeStats {
        &self.stats
    }

    pub fn last_signal(&self) -> Option<&SignalRecord> {
        self.signals.back()
    }

    /// Oldest first, at most [`SIGNAL_HISTORY_LIMIT`].
    pub fn signals(&self) -> &VecDeque<SignalRecord> {
        &self.signals
    }

    pub fn history(&self) -> &VecDeque<TradeRecord> {
        &self.history
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Opens `position` unless one is already open.
    pub fn open(&mut self, position: Position) -> bool {
        if self.position.is_some() {
            return false;
        }
        self.position = Some(position);
        true
    }

    pub(crate) fn position_mut(&mut self) -> Option<&mut Position> {
        self.position.as_mut()
    }

    /// Clears the open position and books the closed trade.
    pub fn close(&mut self, record: TradeRecord) {
        self.position = None;
        self.stats.record(&record);
        if self.history_limit > 0 {
            while self.history.len() >= self.history_limit {
                self.history.pop_front();
            }
            self.history.push_back(record);
        }
    }

    /// Adds `pending` unless one of the same direction is already waiting.
    pub fn add_pending(&mut self, pending: PendingSignal) -> bool {
        if self.pending_for(pending.direction).is_some() {
            return false;
        }
        self.pending.push(pending);
        true
    }

    /// Moves every pending record out for evaluation.  Survivors go back
    /// through [`StateStore::restore_pending`].
    pub(crate) fn take_pending(&mut self) -> Vec<PendingSignal> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn restore_pending(&mut self, pending: Vec<PendingSignal>) {
        for p in pending {
            self.add_pending(p);
        }
    }

    pub fn record_signal(&mut self, record: SignalRecord) {
        while self.signals.len() >= SIGNAL_HISTORY_LIMIT {
            self.signals.pop_front();
        }
        self.signals.push_back(record);
    }

    /// Updates the signal that created pending record `pending_id` once that
    /// record confirms, expires or is blocked.  A signal already rotated out
    /// of the log is left alone.
    pub fn settle_signal(&mut self, pending_id: Uuid, outcome: SignalOutcome, reason: String) {
        if let Some(record) = self
            .signals
            .iter_mut()
            .rev()
            .find(|s| s.pending_id == Some(pending_id))
        {
            record.outcome = outcome;
            record.reason  = reason;
        }
    }

    fn set_history_limit(&mut self, limit: usize) {
        self.history_limit = limit;
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        let store: Self =
            serde_json::from_str(raw).map_err(|e| EngineError::CorruptState(e.to_string()))?;
        if store.version != STATE_VERSION {
            return Err(EngineError::CorruptState(format!(
                "unsupported state version {}",
                store.version
            )));
        }
        Ok(store)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("serialize state")
    }

    /// Loads the store from `path`.
    ///
    /// A missing file is a fresh start.  A file that cannot be parsed is
    /// deleted and replaced by an empty store; startup never fails here.
    pub async fn load(path: &Path, history_limit: usize) -> Self {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no persisted state — starting fresh");
                return Self::new(history_limit);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state file unreadable — reinitialising");
                discard(path).await;
                return Self::new(history_limit);
            }
        };

        match Self::from_json(&raw) {
            Ok(mut store) => {
                store.set_history_limit(history_limit);
                info!(
                    path         = %path.display(),
                    has_position = store.position.is_some(),
                    pending      = store.pending.len(),
                    trades       = store.stats.total_trades,
                    "persisted state restored"
                );
                store
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state file corrupt — deleting and reinitialising");
                discard(path).await;
                Self::new(history_limit)
            }
        }
    }

    /// Writes the store to `path` via a temp file + rename.  The temp file
    /// never outlives a failed save.
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        let tmp = temp_path(path);
        if let Err(e) = tokio::fs::write(&tmp, json).await {
            discard(&tmp).await;
            return Err(anyhow::Error::new(e).context(format!("write {}", tmp.display())));
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            discard(&tmp).await;
            return Err(anyhow::Error::new(e)
                .context(format!("rename {} → {}", tmp.display(), path.display())));
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to delete state file");
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
