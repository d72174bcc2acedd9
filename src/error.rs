//! # error
//!
//! Two layers of errors:
//!
//! * [`EngineError`] — the decision engine's own taxonomy.  Every variant is
//!   local and non-fatal: the tick is skipped or the input rejected, and the
//!   store is left as it was.
//! * [`AppError`] — what HTTP handlers return.  Axum's `IntoResponse` impl
//!   turns it into a structured JSON body so callers always get a
//!   machine-readable response even on failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// No snapshot could be obtained this tick.
    #[error("snapshot fetch failed: {0}")]
    FetchFailed(String),

    /// Signal type outside the fixed enumeration.
    #[error("invalid signal type: {0:?}")]
    InvalidSignalType(String),

    /// Persisted state could not be read back.
    #[error("corrupt persisted state: {0}")]
    CorruptState(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    /// The request payload was syntactically correct but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The addressed resource does not exist, e.g. no open position.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The indicator source did not deliver a usable snapshot.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidSignalType(_) => AppError::BadRequest(err.to_string()),
            EngineError::FetchFailed(_)       => AppError::Upstream(err.to_string()),
            EngineError::CorruptState(_)      => AppError::Internal(err.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
