//! LMS (Box-Cox) conversions between measurements, SDS and centiles.
//!
//! An observation `y` with age-specific parameters (L, M, S) has
//!
//! ```text
//! SDS = ((y / M)^L - 1) / (L * S)      L != 0
//! SDS = ln(y / M) / S                  L == 0
//! ```
//!
//! and the centile is the standard normal CDF of the SDS, as a percentage.

use serde::{Deserialize, Serialize};
use statrs::function::erf::{erfc, erfc_inv};

/// Box-Cox parameters for one age, measurement and sex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lms {
    /// Skewness (Box-Cox power). Zero selects the log transform.
    #[serde(rename = "L")]
    pub l: f64,
    /// Median, in measurement units
    #[serde(rename = "M")]
    pub m: f64,
    /// Coefficient of variation
    #[serde(rename = "S")]
    pub s: f64,
}

/// Errors from the LMS formulas, before query context is attached.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LmsError {
    #[error("Invalid LMS parameters: {0}")]
    InvalidParameters(String),

    #[error("Observation {0} must be a positive finite number")]
    NonPositiveObservation(f64),

    #[error("No measurement corresponds to SDS {0} for these LMS parameters")]
    UndefinedMeasurement(f64),
}

impl Lms {
    #[must_use]
    pub fn new(l: f64, m: f64, s: f64) -> Self {
        Self { l, m, s }
    }

    /// Check the triple can be used in the LMS formulas.
    ///
    /// # Errors
    /// Returns `LmsError::InvalidParameters` if M or S is not positive or
    /// any parameter is not finite.
    pub fn validate(&self) -> Result<(), LmsError> {
        if !self.l.is_finite() {
            return Err(LmsError::InvalidParameters(format!("L={} is not finite", self.l)));
        }
        if !(self.m.is_finite() && self.m > 0.0) {
            return Err(LmsError::InvalidParameters(format!("M={} must be positive", self.m)));
        }
        if !(self.s.is_finite() && self.s > 0.0) {
            return Err(LmsError::InvalidParameters(format!("S={} must be positive", self.s)));
        }
        Ok(())
    }
}

/// Standard deviation score of `observation` against `lms`.
///
/// # Errors
/// Returns error if the parameters are invalid or the observation is not positive.
pub fn z_score(lms: &Lms, observation: f64) -> Result<f64, LmsError> {
    lms.validate()?;
    if !(observation.is_finite() && observation > 0.0) {
        return Err(LmsError::NonPositiveObservation(observation));
    }

    let Lms { l, m, s } = *lms;
    let sds = if l != 0.0 {
        ((observation / m).powf(l) - 1.0) / (l * s)
    } else {
        (observation / m).ln() / s
    };
    Ok(sds)
}

/// Measurement value lying at `sds` for the given parameters.
///
/// # Errors
/// Returns error if the parameters are invalid, if `1 + L*S*SDS` is not
/// positive (the Box-Cox inverse has no real value there), or if the value
/// is not a positive finite number.
pub fn value_from_z(lms: &Lms, sds: f64) -> Result<f64, LmsError> {
    lms.validate()?;
    if !sds.is_finite() {
        return Err(LmsError::UndefinedMeasurement(sds));
    }

    let Lms { l, m, s } = *lms;
    let value = if l != 0.0 {
        let base = 1.0 + l * s * sds;
        if base <= 0.0 {
            return Err(LmsError::UndefinedMeasurement(sds));
        }
        base.powf(1.0 / l) * m
    } else {
        (s * sds).exp() * m
    };

    // Underflow to zero or overflow to infinity is not a measurement.
    if !(value.is_finite() && value > 0.0) {
        return Err(LmsError::UndefinedMeasurement(sds));
    }
    Ok(value)
}

/// Centile (0-100) for a standard deviation score: `Φ(z) * 100`.
#[must_use]
pub fn centile(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2) * 100.0
}

/// Standard deviation score for a centile strictly between 0 and 100.
///
/// Returns `None` at or beyond the ends of the distribution.
#[must_use]
pub fn sds_for_centile(centile: f64) -> Option<f64> {
    if !(centile > 0.0 && centile < 100.0) {
        return None;
    }
    let p = centile / 100.0;
    Some(-std::f64::consts::SQRT_2 * erfc_inv(2.0 * p))
}

/// The nine centile lines of the UK-WHO charts, spaced two-thirds of an SDS apart.
///
/// Pairs are `(centile label, SDS)`.
pub const COLE_NINE_CENTILES: [(f64, f64); 9] = [
    (0.4, -8.0 / 3.0),
    (2.0, -2.0),
    (9.0, -4.0 / 3.0),
    (25.0, -2.0 / 3.0),
    (50.0, 0.0),
    (75.0, 2.0 / 3.0),
    (91.0, 4.0 / 3.0),
    (98.0, 2.0),
    (99.6, 8.0 / 3.0),
];
