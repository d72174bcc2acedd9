//! # engine::regime
//!
//! Derives a [`SignalType`] from raw tension / acceleration when the indicator
//! source publishes values without a signal label.
//!
//! Checks run top to bottom; the first match wins:
//!
//! ```text
//! T >  tension_threshold  && a < -accel_threshold   → BEARISH_SINGULARITY (0.7)
//! T < -tension_threshold  && a >  accel_threshold   → BULLISH_SINGULARITY (0.6)
//! |T| < oscillation_band  && |a| < accel_threshold  → balanced, no trade  (0.8)
//! T >  0.3                && |a| < 0.01             → HIGH_OSCILLATION    (0.6)
//! T < -0.3                && |a| < 0.01             → LOW_OSCILLATION     (0.6)
//! ```
//!
//! A balanced market is a confident "nothing to do", not a signal.

use serde::Serialize;
use tracing::debug;

use crate::config::{ensure, env_f64, ConfigError};
use crate::error::EngineError;
use crate::models::{IndicatorSnapshot, SignalType};

const OSCILLATION_EDGE: f64 = 0.3;
const OSCILLATION_FLAT_ACCEL: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct RegimeConfig {
    pub tension_threshold:    f64,
    pub accel_threshold:      f64,
    pub oscillation_band:     f64,
    pub confidence_threshold: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            tension_threshold:    0.35,
            accel_threshold:      0.02,
            oscillation_band:     0.5,
            confidence_threshold: 0.6,
        }
    }
}

impl RegimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            tension_threshold:    env_f64("REGIME_TENSION_THRESHOLD", d.tension_threshold)?,
            accel_threshold:      env_f64("REGIME_ACCEL_THRESHOLD", d.accel_threshold)?,
            oscillation_band:     env_f64("REGIME_OSCILLATION_BAND", d.oscillation_band)?,
            confidence_threshold: env_f64("REGIME_CONFIDENCE_THRESHOLD", d.confidence_threshold)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.tension_threshold > 0.0, "regime tension threshold must be > 0")?;
        ensure(self.accel_threshold > 0.0, "regime acceleration threshold must be > 0")?;
        ensure(self.oscillation_band > 0.0, "regime oscillation band must be > 0")
    }
}

/// Outcome of a regime diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Regime {
    /// `None` for a balanced market or a diagnosis below the confidence gate.
    pub signal_type: Option<SignalType>,
    pub confidence:  f64,
    pub description: String,
}

pub fn diagnose(snapshot: &IndicatorSnapshot, config: &RegimeConfig) -> Regime {
    let t = snapshot.tension;
    let a = snapshot.acceleration;

    let (signal_type, confidence, description) =
        if t > config.tension_threshold && a < -config.accel_threshold {
            (Some(SignalType::BearishSingularity), 0.7, format!("bearish singularity (T={t:.2})"))
        } else if t < -config.tension_threshold && a > config.accel_threshold {
            (Some(SignalType::BullishSingularity), 0.6, format!("bullish singularity (T={t:.2})"))
        } else if t.abs() < config.oscillation_band && a.abs() < config.accel_threshold {
            (None, 0.8, format!("balanced oscillation (|T|={:.2})", t.abs()))
        } else if t > OSCILLATION_EDGE && a.abs() < OSCILLATION_FLAT_ACCEL {
            (Some(SignalType::HighOscillation), 0.6, format!("high oscillation (T={t:.2})"))
        } else if t < -OSCILLATION_EDGE && a.abs() < OSCILLATION_FLAT_ACCEL {
            (Some(SignalType::LowOscillation), 0.6, format!("low oscillation (T={t:.2})"))
        } else {
            (None, 0.0, "no regime".to_string())
        };

    if confidence < config.confidence_threshold {
        return Regime {
            signal_type: None,
            confidence:  0.0,
            description: "confidence below threshold".to_string(),
        };
    }

    Regime { signal_type, confidence, description }
}

/// Signal for this tick: the label the source sent, or a diagnosis when it
/// sent none.  An unrecognised label is an error, never a guess.
pub fn resolve_signal(
    label:    Option<&str>,
    snapshot: &IndicatorSnapshot,
    config:   &RegimeConfig,
) -> Result<Option<SignalType>, EngineError> {
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(label) => label.parse().map(Some),
        None => {
            let regime = diagnose(snapshot, config);
            debug!(
                signal     = ?regime.signal_type,
                confidence = regime.confidence,
                description = %regime.description,
                "regime diagnosed"
            );
            Ok(regime.signal_type)
        }
    }
}
