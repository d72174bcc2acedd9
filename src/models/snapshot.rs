//! # models::snapshot
//!
//! Defines [`IndicatorSnapshot`], the per-tick bundle of physical indicators
//! that the upstream signal model produces.  The engine never mutates a
//! snapshot; every decision is a pure function of the snapshot it is handed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One evaluation tick worth of indicator values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// Oscillator-like force.  Sign is the directional bias, magnitude the
    /// strength.
    pub tension: f64,

    /// Rate of change of tension.
    pub acceleration: f64,

    /// Current volume divided by the trailing average volume.
    pub volume_ratio: f64,

    /// `|tension / acceleration|`.  The indicator source may send it; when
    /// it is omitted it is derived from the two fields above.
    #[serde(default)]
    pub ratio: Option<f64>,

    /// Last traded price.
    pub price: f64,

    /// When the upstream model computed these values.
    pub timestamp: DateTime<Utc>,
}

impl IndicatorSnapshot {
    pub fn new(
        tension: f64,
        acceleration: f64,
        volume_ratio: f64,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tension,
            acceleration,
            volume_ratio,
            ratio: Some(derive_ratio(tension, acceleration)),
            price,
            timestamp,
        }
    }

    /// Effective tension/acceleration ratio, derived when not provided.
    #[inline]
    pub fn ratio(&self) -> f64 {
        self.ratio
            .unwrap_or_else(|| derive_ratio(self.tension, self.acceleration))
    }

    /// `true` when every numeric field is finite and the price is positive.
    /// Non-finite input from the indicator source is treated as a failed
    /// fetch, never as a decision input.
    pub fn is_usable(&self) -> bool {
        self.tension.is_finite()
            && self.acceleration.is_finite()
            && self.volume_ratio.is_finite()
            && self.ratio().is_finite()
            && self.price.is_finite()
            && self.price > 0.0
    }
}

/// `|tension / acceleration|`, or `0.0` when acceleration is exactly zero.
#[inline]
pub fn derive_ratio(tension: f64, acceleration: f64) -> f64 {
    if acceleration == 0.0 {
        0.0
    } else {
        (tension / acceleration).abs()
    }
}
