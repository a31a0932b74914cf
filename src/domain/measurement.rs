//! Measurement and sex types.
//!
//! Names follow the reference data files: lower-case `height`, `weight`,
//! `bmi`, `ofc` and `male` / `female`.

use serde::{Deserialize, Serialize};

/// Type of anthropometric observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    /// Length (lying) or height (standing), in cm
    Height,
    /// Weight in kg
    Weight,
    /// Body mass index in kg/m²
    Bmi,
    /// Occipitofrontal (head) circumference in cm
    Ofc,
}

impl MeasurementType {
    /// All measurement types, in reference file order.
    pub const ALL: [MeasurementType; 4] = [Self::Height, Self::Weight, Self::Bmi, Self::Ofc];

    /// Reference file key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Height => "height",
            Self::Weight => "weight",
            Self::Bmi => "bmi",
            Self::Ofc => "ofc",
        }
    }

    /// Unit of the raw measurement value.
    #[must_use]
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Height | Self::Ofc => "cm",
            Self::Weight => "kg",
            Self::Bmi => "kg/m²",
        }
    }
}

impl std::fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MeasurementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "height" | "length" => Ok(Self::Height),
            "weight" => Ok(Self::Weight),
            "bmi" => Ok(Self::Bmi),
            "ofc" | "head_circumference" => Ok(Self::Ofc),
            other => Err(format!(
                "Unknown measurement '{other}' (expected height, weight, bmi or ofc)"
            )),
        }
    }
}

/// Sex of the child, selecting the reference population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Self::Male, Self::Female];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            other => Err(format!("Unknown sex '{other}' (expected male or female)")),
        }
    }
}

/// Error type for derived measurements.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum MeasurementError {
    #[error("Height {0} cm must be a positive finite number")]
    InvalidHeight(f64),

    #[error("Weight {0} kg must be a positive finite number")]
    InvalidWeight(f64),
}

/// Body mass index from height (cm) and weight (kg).
///
/// # Errors
/// Returns error if either input is not a positive finite number.
pub fn bmi_from_height_weight(height_cm: f64, weight_kg: f64) -> Result<f64, MeasurementError> {
    if !(height_cm.is_finite() && height_cm > 0.0) {
        return Err(MeasurementError::InvalidHeight(height_cm));
    }
    if !(weight_kg.is_finite() && weight_kg > 0.0) {
        return Err(MeasurementError::InvalidWeight(weight_kg));
    }
    let height_m = height_cm / 100.0;
    Ok(weight_kg / (height_m * height_m))
}
