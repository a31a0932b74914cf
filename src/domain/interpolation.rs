//! LMS interpolation and the growth reference engine.
//!
//! Between reference rows, L, M and S are interpolated independently with a
//! 4-point Lagrange cubic through the two rows below and the two rows above
//! the age. Where the profile marks a linear zone the two bracketing rows
//! are used instead. An age that lands exactly on a row returns that row.

use serde::{Deserialize, Serialize};

use super::lms::{self, Lms};
use super::measurement::{MeasurementType, Sex};
use super::profile::ReferenceProfile;
use super::reference::{Query, ReferenceError, ReferenceSeries, ReferenceTable};

/// How the LMS triple for a query was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    /// Age matched a reference row
    Exact,
    /// 4-point Lagrange cubic
    Cubic,
    /// 2-point linear
    Linear,
}

impl std::fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Cubic => write!(f, "cubic"),
            Self::Linear => write!(f, "linear"),
        }
    }
}

/// Interpolated LMS values with the row they were anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interpolation {
    pub lms: Lms,
    pub mode: InterpolationMode,
    /// Index of the last row at or below the age
    pub index: usize,
}

/// 4-point Lagrange cubic through `(ages[k], values[k])`, evaluated at `t`.
///
/// The operation order matches LMSGrowth so results agree to the last bit
/// with the validation software.
#[must_use]
pub fn cubic_interpolation(t: f64, ages: [f64; 4], values: [f64; 4]) -> f64 {
    let [age_two_below, age_one_below, age_one_above, age_two_above] = ages;
    let [p0, p1, p2, p3] = values;

    let tt0 = t - age_two_below;
    let tt1 = t - age_one_below;
    let tt2 = t - age_one_above;
    let tt3 = t - age_two_above;

    let t01 = age_two_below - age_one_below;
    let t02 = age_two_below - age_one_above;
    let t03 = age_two_below - age_two_above;

    let t12 = age_one_below - age_one_above;
    let t13 = age_one_below - age_two_above;
    let t23 = age_one_above - age_two_above;

    p0 * tt1 * tt2 * tt3 / t01 / t02 / t03 - p1 * tt0 * tt2 * tt3 / t01 / t12 / t13
        + p2 * tt0 * tt1 * tt3 / t02 / t12 / t23
        - p3 * tt0 * tt1 * tt2 / t03 / t13 / t23
}

/// Straight line through `(x0, y0)` and `(x1, y1)`, evaluated at `t`.
#[must_use]
pub fn linear_interpolation(t: f64, (x0, y0): (f64, f64), (x1, y1): (f64, f64)) -> f64 {
    let slope = (y1 - y0) / (x1 - x0);
    slope * (t - x0) + y0
}

/// Reference table plus the rules for interpolating it.
///
/// All operations are pure; share one instance across threads.
#[derive(Debug, Clone)]
pub struct GrowthReference {
    table: ReferenceTable,
    profile: ReferenceProfile,
}

impl GrowthReference {
    #[must_use]
    pub fn new(table: ReferenceTable, profile: ReferenceProfile) -> Self {
        Self { table, profile }
    }

    #[must_use]
    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    #[must_use]
    pub fn profile(&self) -> &ReferenceProfile {
        &self.profile
    }

    /// Interpolated L, M and S for an age, measurement and sex.
    ///
    /// # Errors
    /// See [`GrowthReference::interpolate`].
    pub fn get_lms(&self, age: f64, measurement: MeasurementType, sex: Sex) -> Result<Lms, ReferenceError> {
        self.interpolate(age, measurement, sex).map(|i| i.lms)
    }

    /// Interpolate the LMS triple and report how it was obtained.
    ///
    /// # Errors
    /// - `OutOfDomainAge` if the age is NaN or outside the series
    /// - `UnsupportedMeasurementRange` if the profile has no data for the
    ///   measurement at this age
    /// - `InvalidLmsData` if the series is missing or a needed row is a gap
    pub fn interpolate(
        &self,
        age: f64,
        measurement: MeasurementType,
        sex: Sex,
    ) -> Result<Interpolation, ReferenceError> {
        let query = Query::new(age, measurement, sex);

        let series = self
            .table
            .series(measurement, sex)
            .ok_or_else(|| ReferenceError::InvalidLmsData {
                query,
                detail: format!("reference '{}' has no {measurement} data for {sex}", self.table.name()),
            })?;

        let (min, max) = (series.min_age(), series.max_age());
        if !(age >= min && age <= max) {
            return Err(ReferenceError::OutOfDomainAge { query, min, max });
        }

        self.profile
            .check_coverage(age, measurement, sex)
            .map_err(|reason| ReferenceError::UnsupportedMeasurementRange {
                query,
                reason: reason.to_string(),
            })?;

        let index = series
            .locate(age)
            .ok_or(ReferenceError::OutOfDomainAge { query, min, max })?;

        if series.age_at(index) == Some(age) {
            let lms = row_lms(series, index, &query)?;
            return Ok(Interpolation {
                lms,
                mode: InterpolationMode::Exact,
                index,
            });
        }

        let (lms, mode) = if self.cubic_nodes_available(series, index, &query) {
            let nodes = [index - 1, index, index + 1, index + 2];
            let mut ages = [0.0; 4];
            let mut rows = [Lms::new(0.0, 0.0, 0.0); 4];
            for (k, &node) in nodes.iter().enumerate() {
                ages[k] = series.points()[node].age;
                rows[k] = row_lms(series, node, &query)?;
            }
            let lms = Lms {
                l: cubic_interpolation(age, ages, rows.map(|r| r.l)),
                m: cubic_interpolation(age, ages, rows.map(|r| r.m)),
                s: cubic_interpolation(age, ages, rows.map(|r| r.s)),
            };
            (lms, InterpolationMode::Cubic)
        } else {
            let below = series.points()[index].age;
            let above = series
                .age_at(index + 1)
                .ok_or(ReferenceError::OutOfDomainAge { query, min, max })?;
            let lo = row_lms(series, index, &query)?;
            let hi = row_lms(series, index + 1, &query)?;
            let lms = Lms {
                l: linear_interpolation(age, (below, lo.l), (above, hi.l)),
                m: linear_interpolation(age, (below, lo.m), (above, hi.m)),
                s: linear_interpolation(age, (below, lo.s), (above, hi.s)),
            };
            (lms, InterpolationMode::Linear)
        };

        tracing::trace!(%query, %mode, index, l = lms.l, m = lms.m, s = lms.s, "Interpolated LMS");

        lms.validate()
            .map_err(|e| ReferenceError::from_lms(query, e))?;

        Ok(Interpolation { lms, mode, index })
    }

    /// Cubic needs the profile's approval and four rows at distinct ages.
    fn cubic_nodes_available(&self, series: &ReferenceSeries, index: usize, query: &Query) -> bool {
        if !self
            .profile
            .can_use_cubic(query.age, query.measurement, query.sex)
        {
            return false;
        }
        if index == 0 || index + 2 >= series.len() {
            return false;
        }
        series.points()[index - 1..=index + 2]
            .windows(2)
            .all(|w| w[0].age < w[1].age)
    }

    /// Standard deviation score of a measurement.
    ///
    /// # Errors
    /// Returns a lookup error, or `InvalidObservation` if `value` is not positive.
    pub fn sds(
        &self,
        age: f64,
        measurement: MeasurementType,
        value: f64,
        sex: Sex,
    ) -> Result<f64, ReferenceError> {
        let lms = self.get_lms(age, measurement, sex)?;
        lms::z_score(&lms, value)
            .map_err(|e| ReferenceError::from_lms(Query::new(age, measurement, sex), e))
    }

    /// Measurement value lying at `requested_sds`.
    ///
    /// # Errors
    /// Returns a lookup error, or `UndefinedMeasurement` if no real value
    /// corresponds to the SDS.
    pub fn measurement_from_sds(
        &self,
        measurement: MeasurementType,
        requested_sds: f64,
        sex: Sex,
        age: f64,
    ) -> Result<f64, ReferenceError> {
        let lms = self.get_lms(age, measurement, sex)?;
        lms::value_from_z(&lms, requested_sds)
            .map_err(|e| ReferenceError::from_lms(Query::new(age, measurement, sex), e))
    }

    /// BMI as a percentage of the median BMI for age and sex.
    ///
    /// # Errors
    /// See [`GrowthReference::percentage_median_for`].
    pub fn percentage_median(&self, age: f64, actual_value: f64, sex: Sex) -> Result<f64, ReferenceError> {
        self.percentage_median_for(MeasurementType::Bmi, age, actual_value, sex)
    }

    /// Any measurement as a percentage of its median for age and sex.
    ///
    /// # Errors
    /// Returns a lookup error, or `InvalidObservation` if `actual_value` is
    /// not finite.
    pub fn percentage_median_for(
        &self,
        measurement: MeasurementType,
        age: f64,
        actual_value: f64,
        sex: Sex,
    ) -> Result<f64, ReferenceError> {
        let query = Query::new(age, measurement, sex);
        if !actual_value.is_finite() {
            return Err(ReferenceError::InvalidObservation {
                query,
                value: actual_value,
            });
        }
        let m = self.get_lms(age, measurement, sex)?.m;
        Ok(actual_value / m * 100.0)
    }
}

fn row_lms(series: &ReferenceSeries, index: usize, query: &Query) -> Result<Lms, ReferenceError> {
    let point = series.points()[index];
    point.lms.ok_or_else(|| ReferenceError::InvalidLmsData {
        query: *query,
        detail: format!("no reference row at age {}", point.age),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::profile::UK_WHO_DECIMAL_AGES;
    use crate::domain::reference::ReferencePoint;
    use MeasurementType::{Bmi, Height, Ofc, Weight};
    use Sex::{Female, Male};

    /// Offset applied after each population seam so duplicate rows differ.
    fn seam_offset(index: usize) -> f64 {
        match index {
            0..=19 => 0.0,
            20..=55 => 0.4,
            56..=80 => -0.3,
            _ => 0.2,
        }
    }

    /// Whether the UK-WHO reference has data for this row.
    fn has_data(measurement: MeasurementType, sex: Sex, age: f64, index: usize) -> bool {
        match measurement {
            Height => age >= -0.287474333,
            Bmi => index >= 20,
            Ofc => match sex {
                Male => age <= 18.0,
                Female => age <= 17.0,
            },
            Weight => true,
        }
    }

    /// Smooth synthetic LMS on the UK-WHO age grid, with gaps where the
    /// real reference has no data and distinct rows at every seam.
    pub(crate) fn synthetic_table() -> ReferenceTable {
        let mut series = Vec::new();
        for measurement in MeasurementType::ALL {
            for sex in Sex::ALL {
                let base = match measurement {
                    Height => 50.0,
                    Weight => 3.5,
                    Bmi => 13.5,
                    Ofc => 35.0,
                };
                let growth = match measurement {
                    Height => 12.0,
                    Weight => 3.0,
                    Bmi => 0.3,
                    Ofc => 1.5,
                };
                let sex_shift = if sex == Male { 1.0 } else { 0.0 };
                let points = UK_WHO_DECIMAL_AGES
                    .iter()
                    .enumerate()
                    .map(|(index, &age)| {
                        if !has_data(measurement, sex, age, index) {
                            return ReferencePoint::gap(age);
                        }
                        let a = age + 0.4;
                        let lms = Lms::new(
                            0.5 - 0.05 * a + 0.01 * a.sin(),
                            base + growth * a.sqrt() * 3.0 + sex_shift + seam_offset(index),
                            0.04 + 0.002 * a.cos(),
                        );
                        ReferencePoint::new(age, lms)
                    })
                    .collect();
                series.push((
                    (measurement, sex),
                    ReferenceSeries::new(measurement, sex, points).expect("synthetic series"),
                ));
            }
        }
        ReferenceTable::new("synthetic-uk-who", series)
    }

    fn engine() -> GrowthReference {
        GrowthReference::new(synthetic_table(), ReferenceProfile::uk_who())
    }

    fn stored(reference: &GrowthReference, measurement: MeasurementType, sex: Sex, index: usize) -> Lms {
        reference
            .table()
            .series(measurement, sex)
            .expect("series")
            .points()[index]
            .lms
            .expect("row has data")
    }

    #[test]
    fn test_cubic_formula_reproduces_cubic_polynomials() {
        let f = |x: f64| 2.0 * x * x * x - x * x + 3.0 * x - 7.0;
        let ages = [0.0, 0.5, 1.25, 2.0];
        let values = ages.map(f);
        for t in [0.6, 0.75, 1.0, 1.2] {
            assert!((cubic_interpolation(t, ages, values) - f(t)).abs() < 1e-10);
        }
    }

    #[test]
    fn test_cubic_passes_through_nodes() {
        let ages = [1.0, 2.0, 3.0, 4.0];
        let values = [5.0, -1.0, 2.5, 8.0];
        for (age, value) in ages.iter().zip(values) {
            assert!((cubic_interpolation(*age, ages, values) - value).abs() < 1e-12);
        }
    }

    #[test]
    fn test_linear_formula() {
        assert_eq!(linear_interpolation(1.5, (1.0, 10.0), (2.0, 20.0)), 15.0);
        assert_eq!(linear_interpolation(1.0, (1.0, 10.0), (2.0, 20.0)), 10.0);
    }

    #[test]
    fn test_cubic_matches_linear_on_collinear_nodes() {
        let ages = [0.9, 1.0, 1.1, 1.2];
        let line = |x: f64| 3.0 * x + 1.0;
        for t in [1.01, 1.05, 1.09] {
            let cubic = cubic_interpolation(t, ages, ages.map(line));
            let linear = linear_interpolation(t, (1.0, line(1.0)), (1.1, line(1.1)));
            assert!((cubic - linear).abs() < 1e-12);
        }

        // Nodes converging onto a line: the cubic tends to the chord.
        for bend in [1e-2, 1e-4, 1e-6] {
            let values = [line(0.9) + bend, line(1.0), line(1.1), line(1.2)];
            let cubic = cubic_interpolation(1.05, ages, values);
            let linear = linear_interpolation(1.05, (1.0, line(1.0)), (1.1, line(1.1)));
            assert!((cubic - linear).abs() <= bend);
        }
    }

    #[test]
    fn test_exact_age_returns_stored_row() {
        let reference = engine();
        for index in [3, 17, 30, 43, 100, 200, 250] {
            let age = UK_WHO_DECIMAL_AGES[index];
            for measurement in [Height, Weight] {
                let result = reference.interpolate(age, measurement, Female).expect("valid age");
                assert_eq!(result.mode, InterpolationMode::Exact);
                assert_eq!(result.index, index);
                assert_eq!(result.lms, stored(&reference, measurement, Female, index));
            }
        }
    }

    #[test]
    fn test_exact_age_on_duplicate_selects_later_row() {
        let reference = engine();

        let at_two = reference.interpolate(2.0, Height, Male).expect("valid");
        assert_eq!(at_two.mode, InterpolationMode::Exact);
        assert_eq!(at_two.index, 56);
        assert_eq!(at_two.lms, stored(&reference, Height, Male, 56));
        assert_ne!(at_two.lms, stored(&reference, Height, Male, 55));

        let at_four = reference.interpolate(4.0, Weight, Female).expect("valid");
        assert_eq!(at_four.index, 81);

        let at_42_weeks = reference.interpolate(0.038329911, Bmi, Male).expect("valid");
        assert_eq!(at_42_weeks.index, 20);
    }

    #[test]
    fn test_cubic_used_away_from_seams() {
        let reference = engine();
        let result = reference.interpolate(1.04, Height, Male).expect("valid");
        assert_eq!(result.mode, InterpolationMode::Cubic);
        assert_eq!(result.index, 43);

        let series = reference.table().series(Height, Male).expect("series");
        let ages = [42, 43, 44, 45].map(|i| series.points()[i].age);
        let rows = [42, 43, 44, 45].map(|i| stored(&reference, Height, Male, i));
        assert_eq!(result.lms.m, cubic_interpolation(1.04, ages, rows.map(|r| r.m)));
        assert_eq!(result.lms.l, cubic_interpolation(1.04, ages, rows.map(|r| r.l)));
        assert_eq!(result.lms.s, cubic_interpolation(1.04, ages, rows.map(|r| r.s)));
    }

    #[test]
    fn test_linear_used_inside_seams() {
        let reference = engine();
        let result = reference.interpolate(2.05, Height, Male).expect("valid");
        assert_eq!(result.mode, InterpolationMode::Linear);
        assert_eq!(result.index, 56);

        let lo = stored(&reference, Height, Male, 56);
        let hi = stored(&reference, Height, Male, 57);
        let expected = linear_interpolation(2.05, (2.0, lo.m), (2.083333333, hi.m));
        assert_eq!(result.lms.m, expected);

        let before = reference.interpolate(1.95, Height, Male).expect("valid");
        assert_eq!(before.mode, InterpolationMode::Linear);
        assert_eq!(before.index, 54);

        let ofc = reference.interpolate(17.95, Ofc, Male).expect("valid");
        assert_eq!(ofc.mode, InterpolationMode::Linear);
    }

    #[test]
    fn test_out_of_domain_age_is_an_error() {
        let reference = engine();
        for age in [25.0, 20.0001, -0.5, f64::NAN, f64::INFINITY] {
            let err = reference.sds(age, Height, 150.0, Male).expect_err("outside table");
            assert!(
                matches!(err, ReferenceError::OutOfDomainAge { .. }),
                "age {age} gave {err:?}"
            );
        }
        let err = reference.get_lms(25.0, Weight, Female).expect_err("above 20y");
        assert_eq!(err.query().age, 25.0);
        assert_eq!(err.query().measurement, Weight);
        assert_eq!(err.query().sex, Female);
    }

    #[test]
    fn test_unsupported_measurement_ranges() {
        let reference = engine();
        let cases = [
            (-0.3, Height, Male),
            (0.02, Bmi, Female),
            (18.5, Ofc, Male),
            (17.5, Ofc, Female),
        ];
        for (age, measurement, sex) in cases {
            let err = reference.get_lms(age, measurement, sex).expect_err("no data");
            assert!(
                matches!(err, ReferenceError::UnsupportedMeasurementRange { .. }),
                "{age} {measurement} {sex} gave {err:?}"
            );
        }
        assert!(reference.get_lms(17.5, Ofc, Male).is_ok());
        assert!(reference.get_lms(-0.3, Weight, Male).is_ok());
    }

    #[test]
    fn test_gap_row_is_invalid_lms_data() {
        let points = vec![
            ReferencePoint::new(0.0, Lms::new(1.0, 50.0, 0.04)),
            ReferencePoint::gap(0.5),
            ReferencePoint::new(1.0, Lms::new(1.0, 60.0, 0.04)),
        ];
        let series = ReferenceSeries::new(Weight, Male, points).expect("valid");
        let table = ReferenceTable::new("gappy", [((Weight, Male), series)]);
        let reference = GrowthReference::new(table, ReferenceProfile::uk_who());

        let err = reference.get_lms(0.25, Weight, Male).expect_err("gap above");
        assert!(matches!(err, ReferenceError::InvalidLmsData { .. }));
        assert!(reference.get_lms(0.0, Weight, Male).is_ok());

        let missing = reference.get_lms(0.25, Height, Male).expect_err("no series");
        assert!(matches!(missing, ReferenceError::InvalidLmsData { .. }));
    }

    #[test]
    fn test_sds_and_measurement_from_sds_are_inverse() {
        let reference = engine();
        let ages = [-0.25, -0.1, 0.01, 0.05, 0.3, 1.0, 1.04, 1.99, 2.0, 2.04, 3.99, 4.05, 9.3, 15.0, 19.95];
        for measurement in [Height, Weight] {
            for sex in Sex::ALL {
                for age in ages {
                    let median = reference.get_lms(age, measurement, sex).expect("valid").m;
                    for factor in [0.85, 1.0, 1.1] {
                        let value = median * factor;
                        let sds = reference.sds(age, measurement, value, sex).expect("valid");
                        let back = reference
                            .measurement_from_sds(measurement, sds, sex, age)
                            .expect("valid");
                        assert!((back - value).abs() < 1e-6, "{measurement} {sex} {age}: {value} vs {back}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_sds_end_to_end_at_one_year() {
        // Boys' length at 12 months (WHO 2006): L=1, M=75.7488, S=0.03137.
        let mut points: Vec<ReferencePoint> = synthetic_table()
            .series(Height, Male)
            .expect("series")
            .points()
            .to_vec();
        points[43] = ReferencePoint::new(1.0, Lms::new(1.0, 75.7488, 0.03137));
        let series = ReferenceSeries::new(Height, Male, points).expect("valid");
        let reference = GrowthReference::new(
            ReferenceTable::new("pinned", [((Height, Male), series)]),
            ReferenceProfile::uk_who(),
        );

        let sds = reference.sds(1.0, Height, 76.0, Male).expect("valid");
        assert!((sds - 0.105_713_234).abs() < 1e-8, "sds was {sds}");
        let centile = lms::centile(sds);
        assert!((centile - 54.2).abs() < 0.05, "centile was {centile}");
    }

    #[test]
    fn test_median_has_zero_sds() {
        let reference = engine();
        let lms = reference.get_lms(7.3, Weight, Female).expect("valid");
        let sds = reference.sds(7.3, Weight, lms.m, Female).expect("valid");
        assert!(sds.abs() < 1e-12);
    }

    #[test]
    fn test_percentage_median() {
        let reference = engine();
        let m = reference.get_lms(10.2, Bmi, Female).expect("valid").m;
        let pct = reference.percentage_median(10.2, m * 0.8, Female).expect("valid");
        assert!((pct - 80.0).abs() < 1e-9);

        let pct_height = reference
            .percentage_median_for(Height, 10.2, m, Female)
            .expect("valid");
        assert!(pct_height > 0.0);

        assert!(reference.percentage_median(0.02, 15.0, Male).is_err());
        assert!(reference.percentage_median(5.0, f64::NAN, Male).is_err());
    }

    #[test]
    fn test_invalid_observation_is_reported() {
        let reference = engine();
        let err = reference.sds(5.0, Weight, 0.0, Male).expect_err("zero weight");
        assert!(matches!(err, ReferenceError::InvalidObservation { value, .. } if value == 0.0));
    }
}
