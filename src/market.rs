//! # market — Indicator source client
//!
//! Fetches the current [`IndicatorSnapshot`] from the upstream physical
//! model over HTTP.
//!
//! ## Contract
//! `GET {INDICATOR_URL}` returns:
//! ```json
//! { "tension": 0.82, "acceleration": -0.007, "volume_ratio": 0.74,
//!   "price": 64250.5, "timestamp": "2026-01-14T08:00:00Z",
//!   "ratio": 117.1, "signal_type": "BEARISH_SINGULARITY" }
//! ```
//! `ratio`, `timestamp` and `signal_type` are optional.
//!
//! Every failure (timeout, HTTP status, bad body, non-finite numbers) maps to
//! [`EngineError::FetchFailed`]; the caller skips the tick.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::models::IndicatorSnapshot;

#[derive(Debug, Deserialize)]
struct IndicatorResponse {
    tension:      f64,
    acceleration: f64,
    volume_ratio: f64,
    #[serde(default)]
    ratio:        Option<f64>,
    price:        f64,
    #[serde(default)]
    timestamp:    Option<DateTime<Utc>>,
    #[serde(default)]
    signal_type:  Option<String>,
}

/// One fetched reading: the snapshot plus the raw signal label, if any.
#[derive(Debug, Clone)]
pub struct IndicatorReading {
    pub snapshot:    IndicatorSnapshot,
    pub signal_type: Option<String>,
}

pub async fn fetch_snapshot(
    client:  &reqwest::Client,
    url:     &str,
    timeout: Duration,
) -> Result<IndicatorReading, EngineError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            warn!(error = %e, url, "indicator source unreachable");
            EngineError::FetchFailed(format!("indicator source unreachable: {e}"))
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(http_status = %status, body = %body, "indicator source returned HTTP error");
        return Err(EngineError::FetchFailed(format!("indicator source HTTP {status}")));
    }

    let body: IndicatorResponse = response.json().await.map_err(|e| {
        warn!(error = %e, "indicator response parse failed");
        EngineError::FetchFailed(format!("indicator response parse error: {e}"))
    })?;

    let mut snapshot = IndicatorSnapshot::new(
        body.tension,
        body.acceleration,
        body.volume_ratio,
        body.price,
        body.timestamp.unwrap_or_else(Utc::now),
    );
    if body.ratio.is_some() {
        snapshot.ratio = body.ratio;
    }

    if !snapshot.is_usable() {
        return Err(EngineError::FetchFailed(format!(
            "indicator source sent unusable values: {snapshot:?}"
        )));
    }

    debug!(
        tension      = snapshot.tension,
        acceleration = snapshot.acceleration,
        volume       = snapshot.volume_ratio,
        price        = snapshot.price,
        signal       = ?body.signal_type,
        "indicator snapshot fetched"
    );

    Ok(IndicatorReading { snapshot, signal_type: body.signal_type })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/indicators")
    }

    #[tokio::test]
    async fn test_fetch_parses_reading() {
        let app = Router::new().route(
            "/indicators",
            get(|| async {
                Json(json!({
                    "tension": 0.82, "acceleration": -0.007, "volume_ratio": 0.74,
                    "price": 64250.5, "signal_type": "BEARISH_SINGULARITY"
                }))
            }),
        );
        let url = serve(app).await;

        let reading = fetch_snapshot(&reqwest::Client::new(), &url, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reading.snapshot.price, 64250.5);
        assert!((reading.snapshot.ratio() - 0.82 / 0.007).abs() < 1e-6);
        assert!(reading.snapshot.ratio.is_some());
        assert_eq!(reading.signal_type.as_deref(), Some("BEARISH_SINGULARITY"));
    }

    #[tokio::test]
    async fn test_sent_ratio_wins_over_derived() {
        let app = Router::new().route(
            "/indicators",
            get(|| async {
                Json(json!({
                    "tension": 0.82, "acceleration": -0.007, "volume_ratio": 0.74,
                    "ratio": 117.1, "price": 64250.5
                }))
            }),
        );
        let url = serve(app).await;

        let reading = fetch_snapshot(&reqwest::Client::new(), &url, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reading.snapshot.ratio, Some(117.1));
        assert!(reading.signal_type.is_none());
    }

    #[tokio::test]
    async fn test_http_error_is_fetch_failure() {
        let app = Router::new().route(
            "/indicators",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "warming up") }),
        );
        let url = serve(app).await;

        let err = fetch_snapshot(&reqwest::Client::new(), &url, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FetchFailed(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_fetch_failure() {
        let app = Router::new().route(
            "/indicators",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let url = serve(app).await;

        let err = fetch_snapshot(&reqwest::Client::new(), &url, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FetchFailed(_)));
    }
}
