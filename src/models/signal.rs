//! # models::signal
//!
//! Signal taxonomy produced by the upstream physical model, the trade
//! [`Direction`] each signal maps to, and the classifier's [`Disposition`].
//!
//! The signal → direction mapping is a hard invariant:
//!
//! ```text
//! BEARISH_SINGULARITY ─┐
//! HIGH_OSCILLATION    ─┴─▶ short
//! BULLISH_SINGULARITY ─┐
//! LOW_OSCILLATION     ─┴─▶ long
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ─── SignalType ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    BearishSingularity,
    HighOscillation,
    BullishSingularity,
    LowOscillation,
}

impl SignalType {
    pub const ALL: [SignalType; 4] = [
        SignalType::BearishSingularity,
        SignalType::HighOscillation,
        SignalType::BullishSingularity,
        SignalType::LowOscillation,
    ];

    /// Fixed trade direction for this signal.
    pub fn direction(self) -> Direction {
        match self {
            SignalType::BearishSingularity | SignalType::HighOscillation => Direction::Short,
            SignalType::BullishSingularity | SignalType::LowOscillation  => Direction::Long,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::BearishSingularity => "BEARISH_SINGULARITY",
            SignalType::HighOscillation    => "HIGH_OSCILLATION",
            SignalType::BullishSingularity => "BULLISH_SINGULARITY",
            SignalType::LowOscillation     => "LOW_OSCILLATION",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::InvalidSignalType(s.to_string()))
    }
}

// ─── Direction ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Short,
    Long,
}

impl Direction {
    /// Percentage change of tension against a reference value.
    ///
    /// Short tension is positive, so the signed change is used.  Long tension
    /// is negative; its change is measured on magnitudes, so a long whose
    /// tension moves from -0.65 to -0.50 reads as -23% (force weakening).
    pub fn tension_change(self, current: f64, reference: f64) -> f64 {
        match self {
            Direction::Short => pct_change(current, reference),
            Direction::Long  => pct_change(current.abs(), reference.abs()),
        }
    }

    /// Signed return in percent from `reference` to `price`, positive when
    /// the move favours this direction.
    ///
    /// Used for both unrealised PnL (reference = entry price) and the price
    /// advantage gained while waiting for confirmation (reference = price at
    /// signal time).
    pub fn pnl_pct(self, reference: f64, price: f64) -> f64 {
        match self {
            Direction::Long  => pct_change(price, reference),
            Direction::Short => -pct_change(price, reference),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Short => "short",
            Direction::Long  => "long",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(value - reference) / reference * 100`, or `0.0` for a zero reference.
#[inline]
fn pct_change(value: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        0.0
    } else {
        (value - reference) / reference * 100.0
    }
}

// ─── Disposition ──────────────────────────────────────────────────────────────

/// What the classifier decided to do with a raw signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Ignore,
    DirectEnter,
    WaitConfirm,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Ignore      => "ignore",
            Disposition::DirectEnter => "direct_enter",
            Disposition::WaitConfirm => "wait_confirm",
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_mapping_is_fixed() {
        assert_eq!(SignalType::BearishSingularity.direction(), Direction::Short);
        assert_eq!(SignalType::HighOscillation.direction(),    Direction::Short);
        assert_eq!(SignalType::BullishSingularity.direction(), Direction::Long);
        assert_eq!(SignalType::LowOscillation.direction(),     Direction::Long);
    }

    #[test]
    fn test_parse_signal_type() {
        assert_eq!("BEARISH_SINGULARITY".parse::<SignalType>().unwrap(), SignalType::BearishSingularity);
        assert_eq!("low_oscillation".parse::<SignalType>().unwrap(), SignalType::LowOscillation);
        assert!(matches!(
            "OSCILLATION".parse::<SignalType>(),
            Err(EngineError::InvalidSignalType(s)) if s == "OSCILLATION"
        ));
    }

    #[test]
    fn test_signal_type_serde_names() {
        let json = serde_json::to_string(&SignalType::HighOscillation).unwrap();
        assert_eq!(json, "\"HIGH_OSCILLATION\"");
        let json = serde_json::to_string(&Direction::Long).unwrap();
        assert_eq!(json, "\"long\"");
    }

    #[test]
    fn test_long_tension_change_uses_magnitude() {
        let change = Direction::Long.tension_change(-0.50, -0.65);
        assert!((change - (-23.0769)).abs() < 1e-3);
    }

    #[test]
    fn test_short_tension_change_is_signed() {
        let change = Direction::Short.tension_change(0.63, 0.60);
        assert!((change - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_pnl_pct_sign_follows_direction() {
        assert!((Direction::Long.pnl_pct(100.0, 102.0) - 2.0).abs() < 1e-9);
        assert!((Direction::Short.pnl_pct(100.0, 102.0) + 2.0).abs() < 1e-9);
        assert_eq!(Direction::Short.pnl_pct(0.0, 102.0), 0.0);
    }
}
