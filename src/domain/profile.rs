//! Reference profile: where cubic interpolation is valid and where each
//! measurement has data.
//!
//! The UK-WHO reference stitches together UK90 preterm, WHO 2006 infant and
//! child, and UK90 child data. Around each seam (and at the ends of each
//! measurement's data) the four nodes needed for cubic interpolation would
//! straddle two populations, so those windows use linear interpolation.
//!
//! The windows are data, not code: a revised dataset ships a revised profile
//! (see [`crate::adapters::json::load_profile`]).

use serde::{Deserialize, Serialize};

use super::measurement::{MeasurementType, Sex};

/// One end of an age range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBound {
    Unbounded,
    Inclusive(f64),
    Exclusive(f64),
}

/// Range of decimal ages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeRange {
    pub lower: AgeBound,
    pub upper: AgeBound,
}

impl AgeRange {
    /// `age < upper`
    #[must_use]
    pub fn below(upper: f64) -> Self {
        Self {
            lower: AgeBound::Unbounded,
            upper: AgeBound::Exclusive(upper),
        }
    }

    /// `age <= upper`
    #[must_use]
    pub fn at_or_below(upper: f64) -> Self {
        Self {
            lower: AgeBound::Unbounded,
            upper: AgeBound::Inclusive(upper),
        }
    }

    /// `age > lower`
    #[must_use]
    pub fn above(lower: f64) -> Self {
        Self {
            lower: AgeBound::Exclusive(lower),
            upper: AgeBound::Unbounded,
        }
    }

    /// `age >= lower`
    #[must_use]
    pub fn at_or_above(lower: f64) -> Self {
        Self {
            lower: AgeBound::Inclusive(lower),
            upper: AgeBound::Unbounded,
        }
    }

    /// `lower < age < upper`
    #[must_use]
    pub fn strictly_between(lower: f64, upper: f64) -> Self {
        Self {
            lower: AgeBound::Exclusive(lower),
            upper: AgeBound::Exclusive(upper),
        }
    }

    #[must_use]
    pub fn contains(&self, age: f64) -> bool {
        let above_lower = match self.lower {
            AgeBound::Unbounded => true,
            AgeBound::Inclusive(x) => age >= x,
            AgeBound::Exclusive(x) => age > x,
        };
        let below_upper = match self.upper {
            AgeBound::Unbounded => true,
            AgeBound::Inclusive(x) => age <= x,
            AgeBound::Exclusive(x) => age < x,
        };
        above_lower && below_upper
    }
}

/// Ages where cubic interpolation must not be used.
///
/// `None` for measurement or sex matches any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearZone {
    #[serde(default)]
    pub measurement: Option<MeasurementType>,
    #[serde(default)]
    pub sex: Option<Sex>,
    pub ages: AgeRange,
    pub reason: String,
}

impl LinearZone {
    fn applies(&self, age: f64, measurement: MeasurementType, sex: Sex) -> bool {
        self.measurement.map_or(true, |m| m == measurement)
            && self.sex.map_or(true, |s| s == sex)
            && self.ages.contains(age)
    }
}

/// Ages for which a measurement has reference data at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageWindow {
    pub measurement: MeasurementType,
    #[serde(default)]
    pub sex: Option<Sex>,
    pub supported: AgeRange,
    pub reason: String,
}

/// Interpolation and coverage rules for one reference dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceProfile {
    pub name: String,
    pub linear_zones: Vec<LinearZone>,
    #[serde(default)]
    pub coverage: Vec<CoverageWindow>,
}

impl ReferenceProfile {
    /// Rules for the UK-WHO 0-20y preterm reference.
    ///
    /// Boundaries are ages from [`UK_WHO_DECIMAL_AGES`]; a data revision
    /// that moves a seam has to move the matching window.
    #[must_use]
    pub fn uk_who() -> Self {
        let zone = |measurement, sex, ages, reason: &str| LinearZone {
            measurement,
            sex,
            ages,
            reason: reason.to_string(),
        };
        let covers = |measurement, sex, supported, reason: &str| CoverageWindow {
            measurement,
            sex,
            supported,
            reason: reason.to_string(),
        };

        Self {
            name: "uk-who".to_string(),
            linear_zones: vec![
                zone(
                    None,
                    None,
                    AgeRange::at_or_below(-0.306639288),
                    "lower edge of the reference (23 weeks gestation)",
                ),
                zone(
                    None,
                    None,
                    AgeRange::strictly_between(0.019164956, 0.057494867),
                    "UK90 preterm to WHO 2006 switch at 42 weeks",
                ),
                zone(
                    None,
                    None,
                    AgeRange::strictly_between(1.916666667, 2.083333333),
                    "lying length to standing height at 2 years",
                ),
                zone(
                    None,
                    None,
                    AgeRange::strictly_between(3.916666667, 4.083),
                    "WHO 2006 to UK90 switch at 4 years",
                ),
                zone(
                    None,
                    None,
                    AgeRange::at_or_above(19.917),
                    "upper edge of the reference (20 years)",
                ),
                zone(
                    Some(MeasurementType::Height),
                    None,
                    AgeRange::below(-0.2683093771),
                    "no length data below 25 weeks gestation",
                ),
                zone(
                    Some(MeasurementType::Bmi),
                    None,
                    AgeRange::below(0.07665982204),
                    "no BMI data below 2 weeks of age",
                ),
                zone(
                    Some(MeasurementType::Ofc),
                    Some(Sex::Male),
                    AgeRange::above(17.917),
                    "no head circumference data for boys over 18 years",
                ),
                zone(
                    Some(MeasurementType::Ofc),
                    Some(Sex::Female),
                    AgeRange::above(16.917),
                    "no head circumference data for girls over 17 years",
                ),
            ],
            coverage: vec![
                covers(
                    MeasurementType::Height,
                    None,
                    AgeRange::at_or_above(-0.287474333),
                    "there is no reference data for length below 25 weeks gestation",
                ),
                covers(
                    MeasurementType::Bmi,
                    None,
                    AgeRange::at_or_above(0.038329911),
                    "there is no BMI reference data below 2 weeks of age",
                ),
                covers(
                    MeasurementType::Ofc,
                    Some(Sex::Male),
                    AgeRange::at_or_below(18.0),
                    "there is no head circumference data for boys over 18 years",
                ),
                covers(
                    MeasurementType::Ofc,
                    Some(Sex::Female),
                    AgeRange::at_or_below(17.0),
                    "there is no head circumference data for girls over 17 years",
                ),
            ],
        }
    }

    /// Whether 4-point cubic interpolation is valid at this age.
    #[must_use]
    pub fn can_use_cubic(&self, age: f64, measurement: MeasurementType, sex: Sex) -> bool {
        self.linear_zone(age, measurement, sex).is_none()
    }

    /// First linear zone containing this age, if any.
    #[must_use]
    pub fn linear_zone(&self, age: f64, measurement: MeasurementType, sex: Sex) -> Option<&LinearZone> {
        self.linear_zones
            .iter()
            .find(|zone| zone.applies(age, measurement, sex))
    }

    /// Check the measurement has data at this age.
    ///
    /// # Errors
    /// Returns the reason of the first coverage window the age falls outside.
    pub fn check_coverage(&self, age: f64, measurement: MeasurementType, sex: Sex) -> Result<(), &str> {
        match self.coverage.iter().find(|window| {
            window.measurement == measurement
                && window.sex.map_or(true, |s| s == sex)
                && !window.supported.contains(age)
        }) {
            Some(window) => Err(window.reason.as_str()),
            None => Ok(()),
        }
    }
}

impl Default for ReferenceProfile {
    fn default() -> Self {
        Self::uk_who()
    }
}

/// Decimal ages of the UK-WHO 0-20y preterm reference rows.
///
/// Shared by every measurement and sex. Repeated ages (0.038329911, 2.0,
/// 4.0) are population seams and each occurrence is a distinct row.
pub const UK_WHO_DECIMAL_AGES: [f64; 274] = [
    -0.325804244, -0.306639288, -0.287474333, -0.268309377, -0.249144422, -0.229979466,
    -0.210814511, -0.191649555, -0.1724846, -0.153319644, -0.134154689, -0.114989733,
    -0.095824778, -0.076659822, -0.057494867, -0.038329911, -0.019164956, 0.0,
    0.019164956, 0.038329911, 0.038329911, 0.057494867, 0.076659822, 0.083333333,
    0.095824778, 0.114989733, 0.134154689, 0.153319644, 0.166666667, 0.1724846,
    0.191649555, 0.210814511, 0.229979466, 0.249144422, 0.25, 0.333333333,
    0.416666667, 0.5, 0.583333333, 0.666666667, 0.75, 0.833333333,
    0.916666667, 1.0, 1.083333333, 1.166666667, 1.25, 1.333333333,
    1.416666667, 1.5, 1.583333333, 1.666666667, 1.75, 1.833333333,
    1.916666667, 2.0, 2.0, 2.083333333, 2.166666667, 2.25,
    2.333333333, 2.416666667, 2.5, 2.583333333, 2.666666667, 2.75,
    2.833333333, 2.916666667, 3.0, 3.083333333, 3.166666667, 3.25,
    3.333333333, 3.416666667, 3.5, 3.583333333, 3.666666667, 3.75,
    3.833333333, 3.916666667, 4.0, 4.0, 4.083, 4.167,
    4.25, 4.333, 4.417, 4.5, 4.583, 4.667,
    4.75, 4.833, 4.917, 5.0, 5.083, 5.167,
    5.25, 5.333, 5.417, 5.5, 5.583, 5.667,
    5.75, 5.833, 5.917, 6.0, 6.083, 6.167,
    6.25, 6.333, 6.417, 6.5, 6.583, 6.667,
    6.75, 6.833, 6.917, 7.0, 7.083, 7.167,
    7.25, 7.333, 7.417, 7.5, 7.583, 7.667,
    7.75, 7.833, 7.917, 8.0, 8.083, 8.167,
    8.25, 8.333, 8.417, 8.5, 8.583, 8.667,
    8.75, 8.833, 8.917, 9.0, 9.083, 9.167,
    9.25, 9.333, 9.417, 9.5, 9.583, 9.667,
    9.75, 9.833, 9.917, 10.0, 10.083, 10.167,
    10.25, 10.333, 10.417, 10.5, 10.583, 10.667,
    10.75, 10.833, 10.917, 11.0, 11.083, 11.167,
    11.25, 11.333, 11.417, 11.5, 11.583, 11.667,
    11.75, 11.833, 11.917, 12.0, 12.083, 12.167,
    12.25, 12.333, 12.417, 12.5, 12.583, 12.667,
    12.75, 12.833, 12.917, 13.0, 13.083, 13.167,
    13.25, 13.333, 13.417, 13.5, 13.583, 13.667,
    13.75, 13.833, 13.917, 14.0, 14.083, 14.167,
    14.25, 14.333, 14.417, 14.5, 14.583, 14.667,
    14.75, 14.833, 14.917, 15.0, 15.083, 15.167,
    15.25, 15.333, 15.417, 15.5, 15.583, 15.667,
    15.75, 15.833, 15.917, 16.0, 16.083, 16.167,
    16.25, 16.333, 16.417, 16.5, 16.583, 16.667,
    16.75, 16.833, 16.917, 17.0, 17.083, 17.167,
    17.25, 17.333, 17.417, 17.5, 17.583, 17.667,
    17.75, 17.833, 17.917, 18.0, 18.083, 18.167,
    18.25, 18.333, 18.417, 18.5, 18.583, 18.667,
    18.75, 18.833, 18.917, 19.0, 19.083, 19.167,
    19.25, 19.333, 19.417, 19.5, 19.583, 19.667,
    19.75, 19.833, 19.917, 20.0,
];
