//! Tilt readings and the level indicator.
//!
//! The motion sensor reports `beta`, the rotation around the device x-axis
//! in radians. A phone held upright reads `beta = π/2`, so the tilt is the
//! signed difference from 90 degrees. The indicator only looks at the
//! magnitude.

use serde::{Deserialize, Serialize};

use crate::config::TiltConfig;

/// Pitch of an upright phone, in degrees.
const UPRIGHT_DEGREES: f64 = 90.0;

/// One tilt reading, in signed degrees from upright.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct TiltReading(f64);

impl TiltReading {
    /// Wrap a value already expressed in degrees from upright.
    #[must_use]
    pub const fn from_degrees(degrees: f64) -> Self {
        Self(degrees)
    }

    /// Derive a reading from a sensor `beta` value in radians.
    ///
    /// Returns `None` for non-finite input.
    #[must_use]
    pub fn from_beta_radians(beta: f64) -> Option<Self> {
        if !beta.is_finite() {
            return None;
        }
        Some(Self(beta.to_degrees() - UPRIGHT_DEGREES))
    }

    /// Signed degrees from upright.
    #[must_use]
    pub const fn degrees(self) -> f64 {
        self.0
    }

    /// Unsigned degrees from upright.
    #[must_use]
    pub fn magnitude(self) -> f64 {
        self.0.abs()
    }

    /// Text sent with an upload: two decimals.
    #[must_use]
    pub fn to_form_value(self) -> String {
        format!("{:.2}", self.0)
    }
}

/// Upload text for an optional reading; `"0"` when the sensor is silent.
#[must_use]
pub fn form_value(reading: Option<TiltReading>) -> String {
    reading.map_or_else(|| "0".to_string(), TiltReading::to_form_value)
}

/// Severity of a tilt reading.
///
/// The bands are advice for the user; capture is never blocked on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiltBand {
    /// Close enough to level.
    Nominal,
    /// Usable, but the estimate will suffer.
    Caution,
    /// Too far off; the backend is likely to refuse the photo.
    Reject,
}

impl TiltBand {
    /// Indicator color for this band.
    #[must_use]
    pub const fn color(self) -> IndicatorColor {
        match self {
            Self::Nominal => IndicatorColor::Green,
            Self::Caution => IndicatorColor::Amber,
            Self::Reject => IndicatorColor::Red,
        }
    }
}

impl std::fmt::Display for TiltBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nominal => write!(f, "nominal"),
            Self::Caution => write!(f, "caution"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Color of the on-screen level indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorColor {
    /// Level.
    Green,
    /// Slightly off.
    Amber,
    /// Retake advised.
    Red,
}

impl IndicatorColor {
    /// Hex color used when rendering.
    #[must_use]
    pub const fn hex(self) -> &'static str {
        match self {
            Self::Green => "#2e7d32",
            Self::Amber => "#f9a825",
            Self::Red => "#c62828",
        }
    }
}

impl std::fmt::Display for IndicatorColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Green => write!(f, "green"),
            Self::Amber => write!(f, "amber"),
            Self::Red => write!(f, "red"),
        }
    }
}

/// Classifies readings into bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltPolicy {
    nominal_max: f64,
    caution_max: f64,
}

impl Default for TiltPolicy {
    fn default() -> Self {
        Self {
            nominal_max: 2.0,
            caution_max: 5.0,
        }
    }
}

impl From<&TiltConfig> for TiltPolicy {
    fn from(config: &TiltConfig) -> Self {
        Self {
            nominal_max: config.nominal_max_degrees,
            caution_max: config.caution_max_degrees,
        }
    }
}

impl TiltPolicy {
    /// Band for a reading. Both thresholds are inclusive.
    #[must_use]
    pub fn classify(&self, reading: TiltReading) -> TiltBand {
        let magnitude = reading.magnitude();
        if magnitude <= self.nominal_max {
            TiltBand::Nominal
        } else if magnitude <= self.caution_max {
            TiltBand::Caution
        } else {
            TiltBand::Reject
        }
    }

    /// Indicator for an optional reading; no reading yet means no indicator.
    #[must_use]
    pub fn indicator(&self, reading: Option<TiltReading>) -> Option<TiltIndicator> {
        reading.map(|reading| {
            let band = self.classify(reading);
            TiltIndicator {
                reading,
                band,
                color: band.color(),
            }
        })
    }
}

/// What the screen shows for the current reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TiltIndicator {
    /// The reading.
    pub reading: TiltReading,
    /// Its band.
    pub band: TiltBand,
    /// Its color.
    pub color: IndicatorColor,
}

impl std::fmt::Display for TiltIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}° ({})", self.reading.magnitude(), self.color)
    }
}
