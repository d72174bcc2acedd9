//! # engine::classifier
//!
//! **Signal Classifier** — first look at a raw signal.
//!
//! ```text
//! short (BEARISH_SINGULARITY / HIGH_OSCILLATION)
//!     T < 0.5                                        → ignore
//!     T ≥ 0.8 && 0.5 ≤ V ≤ 1.0 && 50 ≤ R ≤ 150       → direct_enter
//!     otherwise                                      → wait_confirm
//!
//! long (BULLISH_SINGULARITY / LOW_OSCILLATION)
//!     T > -0.5                                       → ignore
//!     T ≤ -0.7 && R ≥ 100                            → direct_enter
//!     otherwise                                      → wait_confirm
//! ```
//!
//! Pure: the store side effects of each disposition live in
//! [`crate::engine::session`].

use serde::Serialize;
use tracing::debug;

use crate::config::{ensure, env_f64, ConfigError};
use crate::models::{Direction, Disposition, IndicatorSnapshot, SignalType};

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Short signals below this tension are ignored.
    pub short_tension_min:    f64,
    /// Short tension at or above this may enter directly.
    pub short_tension_direct: f64,
    pub short_volume_min:     f64,
    pub short_volume_max:     f64,
    pub short_ratio_min:      f64,
    pub short_ratio_max:      f64,

    /// Long signals above this tension are ignored.
    pub long_tension_max:     f64,
    /// Long tension at or below this may enter directly.
    pub long_tension_strong:  f64,
    pub long_ratio_min:       f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            short_tension_min:    0.5,
            short_tension_direct: 0.8,
            short_volume_min:     0.5,
            short_volume_max:     1.0,
            short_ratio_min:      50.0,
            short_ratio_max:      150.0,
            long_tension_max:     -0.5,
            long_tension_strong:  -0.7,
            long_ratio_min:       100.0,
        }
    }
}

impl ClassifierConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            short_tension_min:    env_f64("ENGINE_SHORT_TENSION_MIN", d.short_tension_min)?,
            short_tension_direct: env_f64("ENGINE_SHORT_TENSION_DIRECT", d.short_tension_direct)?,
            short_volume_min:     env_f64("ENGINE_SHORT_VOLUME_MIN", d.short_volume_min)?,
            short_volume_max:     env_f64("ENGINE_SHORT_VOLUME_MAX", d.short_volume_max)?,
            short_ratio_min:      env_f64("ENGINE_SHORT_RATIO_MIN", d.short_ratio_min)?,
            short_ratio_max:      env_f64("ENGINE_SHORT_RATIO_MAX", d.short_ratio_max)?,
            long_tension_max:     env_f64("ENGINE_LONG_TENSION_MAX", d.long_tension_max)?,
            long_tension_strong:  env_f64("ENGINE_LONG_TENSION_STRONG", d.long_tension_strong)?,
            long_ratio_min:       env_f64("ENGINE_LONG_RATIO_MIN", d.long_ratio_min)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.short_tension_min > 0.0, "short tension min must be positive")?;
        ensure(
            self.short_tension_direct >= self.short_tension_min,
            "short direct tension must be >= short tension min",
        )?;
        ensure(self.short_volume_min <= self.short_volume_max, "short volume band is inverted")?;
        ensure(self.short_ratio_min <= self.short_ratio_max, "short ratio band is inverted")?;
        ensure(self.long_tension_max < 0.0, "long tension max must be negative")?;
        ensure(
            self.long_tension_strong <= self.long_tension_max,
            "long strong tension must be <= long tension max",
        )
    }
}

// ─── Result ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub signal_type: SignalType,
    pub direction:   Direction,
    pub disposition: Disposition,
    pub reason:      String,
}

// ─── Classify ─────────────────────────────────────────────────────────────────

pub fn classify(
    signal_type: SignalType,
    snapshot:    &IndicatorSnapshot,
    config:      &ClassifierConfig,
) -> Classification {
    let direction = signal_type.direction();
    let tension   = snapshot.tension;
    let volume    = snapshot.volume_ratio;
    let ratio     = snapshot.ratio();

    let detail = format!("T={tension:.4}, a={:.6}, V={volume:.2}, R={ratio:.1}", snapshot.acceleration);

    let (disposition, reason) = match direction {
        Direction::Short => {
            if tension < config.short_tension_min {
                (Disposition::Ignore, format!("tension too low: {detail}"))
            } else if tension >= config.short_tension_direct
                && (config.short_volume_min..=config.short_volume_max).contains(&volume)
                && (config.short_ratio_min..=config.short_ratio_max).contains(&ratio)
            {
                (Disposition::DirectEnter, format!("direct short entry: {detail}"))
            } else {
                (Disposition::WaitConfirm, format!("short awaiting confirmation: {detail}"))
            }
        }
        Direction::Long => {
            if tension > config.long_tension_max {
                (Disposition::Ignore, format!("tension too high: {detail}"))
            } else if tension <= config.long_tension_strong && ratio >= config.long_ratio_min {
                (Disposition::DirectEnter, format!("direct long entry: {detail}"))
            } else {
                (Disposition::WaitConfirm, format!("long awaiting confirmation: {detail}"))
            }
        }
    };

    debug!(
        %signal_type,
        %direction,
        disposition = disposition.as_str(),
        tension,
        volume,
        ratio,
        "signal classified"
    );

    Classification { signal_type, direction, disposition, reason }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
