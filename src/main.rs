//! # Tension Trader — Signal-to-Trade Decision Engine
//!
//! ```text
//!  ┌──────────────┐  GET INDICATOR_URL   ┌──────────────────────────────────┐
//!  │  Indicator   │ ◀─────────────────── │ scheduler                        │
//!  │  source      │  (4h signal, 1h exit)│  ├─ regime  (label or diagnosis) │
//!  └──────────────┘                      │  └─ AppState                     │
//!                                        │      ├─ classifier               │
//!  ┌──────────────┐  POST /api/signal    │      ├─ confirmation (golden)    │
//!  │  Operator /  │ ───────────────────▶ │      ├─ exit evaluator           │
//!  │  webhook     │  POST /api/evaluate  │      ├─ StateStore ──▶ JSON file │
//!  └──────────────┘  POST /api/recheck   │      └─ broadcast_tx ──────────┐ │
//!                    POST /api/close     │                                │ │
//!                                        └────────────────────────────────┘ │
//!  ┌──────────────┐  ws://host/ws/monitor ◀─────────────────────────────────┘
//!  │  Dashboard / │  GET /api/monitor/status
//!  │  notifier    │  GET /api/monitor/history
//!  │              │  GET /api/monitor/signals
//!  └──────────────┘
//! ```
//!
//! ## Environment Variables
//!
//! | Variable               | Default                      | Description                    |
//! |------------------------|------------------------------|--------------------------------|
//! | `BIND_ADDR`            | `0.0.0.0:3000`               | Address Axum listens on        |
//! | `STATE_PATH`           | `tension_trader_state.json`  | Persisted decision state       |
//! | `INDICATOR_URL`        | unset                        | Enables the tick scheduler     |
//! | `SIGNAL_INTERVAL_SECS` | `14400`                      | Signal tick cadence            |
//! | `EXIT_INTERVAL_SECS`   | `3600`                       | Exit tick cadence              |
//! | `FETCH_TIMEOUT_SECS`   | `15`                         | Indicator fetch timeout        |
//! | `API_KEY`              | unset                        | Required `X-API-Key` when set  |
//! | `ENGINE_*`, `REGIME_*` | see `config.rs`              | Decision thresholds            |
//! | `RUST_LOG`             | `tension_trader=debug`       | Tracing filter                 |

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod auth;
mod config;
mod engine;
mod error;
mod events;
mod market;
mod models;
mod routes;
mod scheduler;
mod state;
mod store;

use config::{EngineConfig, ServiceConfig};
use state::build_state;
use store::StateStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("tension_trader=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════════════════╗
  ║        TENSION TRADER — Decision Engine               ║
  ║  Classify · Confirm · Golden Entry · Exit · Persist   ║
  ╚═══════════════════════════════════════════════════════╝"#);

    // ── 3. Configuration (fatal on error) ─────────────────────────────────────
    let engine  = EngineConfig::from_env().context("Invalid engine configuration")?;
    let service = ServiceConfig::from_env().context("Invalid service configuration")?;

    // ── 4. Restore persisted state ────────────────────────────────────────────
    let store = StateStore::load(&service.state_path, service.history_limit).await;
    let addr  = service.bind_addr;

    // ── 5. Shared state + scheduler ───────────────────────────────────────────
    let state = build_state(store, engine, service);
    scheduler::spawn(state.clone());

    // ── 6. Bind & Serve ───────────────────────────────────────────────────────
    let app = routes::router(state);

    info!(?addr, "🚀 Tension Trader starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
