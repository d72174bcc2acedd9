//! # config — Environment-driven configuration
//!
//! Every threshold has a documented default and an env override.  A value
//! that is present but unparsable, or a set of values that breaks an ordering
//! constraint, is a [`ConfigError`] and aborts startup.  Nothing else in the
//! service is fatal.

use std::env::VarError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::engine::{
    classifier::ClassifierConfig, confirmation::ConfirmationConfig, exit::ExitConfig,
    regime::RegimeConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is not a valid value")]
    Invalid { key: String, value: String },

    #[error("{key} is not valid unicode")]
    NotUnicode { key: String },

    #[error("inconsistent thresholds: {0}")]
    Inconsistent(String),
}

// ─── Env helpers ──────────────────────────────────────────────────────────────

/// Reads `key`, falling back to `default` only when the variable is unset.
pub fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key:   key.to_string(),
            value: raw,
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode { key: key.to_string() }),
    }
}

/// Like [`env_or`] for floats, additionally rejecting NaN and infinities.
pub fn env_f64(key: &str, default: f64) -> Result<f64, ConfigError> {
    let value: f64 = env_or(key, default)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid { key: key.to_string(), value: value.to_string() })
    }
}

/// Returns `Inconsistent(msg)` unless `ok`.
pub(crate) fn ensure(ok: bool, msg: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Inconsistent(msg.to_string()))
    }
}

// ─── EngineConfig ─────────────────────────────────────────────────────────────

/// All decision thresholds, grouped by the component that reads them.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub regime:       RegimeConfig,
    pub classifier:   ClassifierConfig,
    pub confirmation: ConfirmationConfig,
    pub exit:         ExitConfig,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            regime:       RegimeConfig::from_env()?,
            classifier:   ClassifierConfig::from_env()?,
            confirmation: ConfirmationConfig::from_env()?,
            exit:         ExitConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.regime.validate()?;
        self.classifier.validate()?;
        self.confirmation.validate()?;
        self.exit.validate()
    }
}

// ─── ServiceConfig ────────────────────────────────────────────────────────────

/// Process-level settings: where to listen, where to persist, where to fetch.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr:       SocketAddr,
    pub state_path:      PathBuf,
    /// Indicator source.  `None` disables the scheduler; ticks then arrive
    /// over HTTP only.
    pub indicator_url:   Option<String>,
    /// Classification + confirmation cadence.
    pub signal_interval: Duration,
    /// Exit-evaluation cadence.
    pub exit_interval:   Duration,
    pub fetch_timeout:   Duration,
    /// Closed trades kept in memory for the monitor endpoints.
    pub history_limit:   usize,
    /// `X-API-Key` required on every route but `/health`.  `None` = open.
    pub api_key:         Option<String>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let signal_secs: u64 = env_or("SIGNAL_INTERVAL_SECS", 4 * 3600)?;
        let exit_secs:   u64 = env_or("EXIT_INTERVAL_SECS", 3600)?;
        let fetch_secs:  u64 = env_or("FETCH_TIMEOUT_SECS", 15)?;

        ensure(signal_secs > 0, "SIGNAL_INTERVAL_SECS must be > 0")?;
        ensure(exit_secs > 0, "EXIT_INTERVAL_SECS must be > 0")?;
        ensure(fetch_secs > 0, "FETCH_TIMEOUT_SECS must be > 0")?;

        Ok(Self {
            bind_addr:       env_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            state_path:      env_or("STATE_PATH", PathBuf::from("tension_trader_state.json"))?,
            indicator_url:   std::env::var("INDICATOR_URL").ok().filter(|v| !v.trim().is_empty()),
            signal_interval: Duration::from_secs(signal_secs),
            exit_interval:   Duration::from_secs(exit_secs),
            fetch_timeout:   Duration::from_secs(fetch_secs),
            history_limit:   env_or("HISTORY_LIMIT", 500)?,
            api_key:         std::env::var("API_KEY").ok().filter(|v| !v.is_empty()),
        })
    }
}
