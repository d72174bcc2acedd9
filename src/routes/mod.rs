//! HTTP surface.
//!
//! | Method    | Path                    | Handler                         |
//! |-----------|-------------------------|---------------------------------|
//! | GET       | `/health`               | [`health::health_check`]        |
//! | POST      | `/api/signal`           | [`signal::post_signal`]         |
//! | POST      | `/api/evaluate`         | [`signal::post_evaluate`]       |
//! | POST      | `/api/recheck`          | [`signal::post_recheck`]        |
//! | POST      | `/api/close`            | [`signal::post_close`]          |
//! | GET       | `/api/monitor/status`   | [`monitor::get_status`]         |
//! | GET       | `/api/monitor/history`  | [`monitor::get_history`]        |
//! | GET       | `/api/monitor/signals`  | [`monitor::get_signals`]        |
//! | GET (WS)  | `/ws/monitor`           | [`monitor::ws_monitor`]         |

pub mod health;
pub mod monitor;
pub mod signal;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::require_api_key, state::SharedState};

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health",               get(health::health_check))
        // ── Ticks ─────────────────────────────────────────────────────────────
        .route("/api/signal",           post(signal::post_signal))
        .route("/api/evaluate",         post(signal::post_evaluate))
        .route("/api/recheck",          post(signal::post_recheck))
        .route("/api/close",            post(signal::post_close))
        // ── Monitor ───────────────────────────────────────────────────────────
        .route("/ws/monitor",           get(monitor::ws_monitor))
        .route("/api/monitor/status",   get(monitor::get_status))
        .route("/api/monitor/history",  get(monitor::get_history))
        .route("/api/monitor/signals",  get(monitor::get_signals))
        // ── Middleware ────────────────────────────────────────────────────────
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::state::build_state;
    use crate::state::test_support::{service_config, state_in};
    use crate::store::StateStore;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn direct_short() -> Value {
        json!({
            "signal_type": "BEARISH_SINGULARITY",
            "snapshot": { "tension": 0.9, "acceleration": -0.009, "volume_ratio": 0.7, "price": 100.0 }
        })
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(router(state_in(dir.path())), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_invalid_signal_type_is_400_and_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let (status, body) = call(
            router(state.clone()),
            Method::POST,
            "/api/signal",
            Some(json!({
                "signal_type": "SIDEWAYS",
                "snapshot": { "tension": 0.9, "acceleration": -0.009, "volume_ratio": 0.7, "price": 100.0 }
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("SIDEWAYS"));
        assert!(state.store.lock().await.last_signal().is_none());
        assert!(!state.service.state_path.exists());
    }

    #[tokio::test]
    async fn test_non_finite_snapshot_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = call(
            router(state_in(dir.path())),
            Method::POST,
            "/api/evaluate",
            Some(json!({ "snapshot": { "tension": 0.9, "acceleration": 0.0, "volume_ratio": 0.7, "price": -1.0 } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_signal_then_take_profit_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let (status, body) = call(router(state.clone()), Method::POST, "/api/signal", Some(direct_short())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["events"]
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e["event"] == "POSITION_OPENED"));

        let (_, status_body) = call(router(state.clone()), Method::GET, "/api/monitor/status", None).await;
        assert_eq!(status_body["position"]["direction"], "short");
        assert_eq!(status_body["last_signal"]["disposition"], "direct_enter");

        let (status, body) = call(
            router(state.clone()),
            Method::POST,
            "/api/evaluate",
            Some(json!({ "snapshot": { "tension": 0.4, "acceleration": -0.01, "volume_ratio": 0.8, "price": 95.0 } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["has_position"], false);
        assert_eq!(body["events"][0]["record"]["exit_kind"], "fixed_tp");

        let (_, history) = call(router(state), Method::GET, "/api/monitor/history", None).await;
        assert_eq!(history["count"], 1);
    }

    #[tokio::test]
    async fn test_evaluate_reports_held_position() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        call(router(state.clone()), Method::POST, "/api/signal", Some(direct_short())).await;

        let (status, body) = call(
            router(state.clone()),
            Method::POST,
            "/api/evaluate",
            Some(json!({ "snapshot": { "tension": 0.88, "acceleration": -0.009, "volume_ratio": 0.7, "price": 99.0 } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["has_position"], true);
        assert_eq!(body["events"][0]["event"], "POSITION_HELD");

        let (_, body) = call(
            router(state),
            Method::POST,
            "/api/evaluate",
            Some(json!({ "snapshot": { "tension": 0.88, "acceleration": -0.009, "volume_ratio": 0.7, "price": 99.0 } })),
        )
        .await;
        assert_eq!(body["events"][0]["hold_periods"], 2);
    }

    #[tokio::test]
    async fn test_manual_close_with_price() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let (status, body) = call(router(state.clone()), Method::POST, "/api/close", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);

        let (status, _) = call(router(state.clone()), Method::POST, "/api/close", Some(json!({ "price": 98.0 }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        call(router(state.clone()), Method::POST, "/api/signal", Some(direct_short())).await;
        let (status, body) = call(
            router(state.clone()),
            Method::POST,
            "/api/close",
            Some(json!({ "price": 98.0, "reason": "operator exit" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["record"]["exit_kind"], "manual");
        assert_eq!(body["record"]["exit_reason"], "operator exit");

        let (_, status_body) = call(router(state), Method::GET, "/api/monitor/status", None).await;
        assert!(status_body["position"].is_null());
        assert_eq!(status_body["stats"]["winning_trades"], 1);
    }

    #[tokio::test]
    async fn test_manual_close_rejects_bad_price() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = call(
            router(state_in(dir.path())),
            Method::POST,
            "/api/close",
            Some(json!({ "price": -5.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_signal_log_on_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        call(
            router(state.clone()),
            Method::POST,
            "/api/signal",
            Some(json!({
                "signal_type": "BULLISH_SINGULARITY",
                "snapshot": { "tension": -0.3, "acceleration": 0.01, "volume_ratio": 0.7, "price": 100.0 }
            })),
        )
        .await;
        call(router(state.clone()), Method::POST, "/api/signal", Some(direct_short())).await;

        let (status, body) = call(router(state), Method::GET, "/api/monitor/signals", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["signals"][0]["outcome"], "filtered");
        assert_eq!(body["signals"][1]["outcome"], "traded");
    }

    #[tokio::test]
    async fn test_recheck_without_source_is_502() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(router(state_in(dir.path())), Method::POST, "/api/recheck", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_api_key_required_except_health() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_config(dir.path(), None);
        service.api_key = Some("s3cret".into());
        let state = build_state(StateStore::default(), EngineConfig::default(), service);

        let (status, _) = call(router(state.clone()), Method::GET, "/api/monitor/status", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(router(state.clone()), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);

        let req = Request::builder()
            .uri("/api/monitor/status")
            .header("X-API-Key", "s3cret")
            .body(Body::empty())
            .unwrap();
        let resp = router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
